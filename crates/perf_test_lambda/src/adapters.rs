pub mod invoke;
pub mod local_execution;
pub mod log_source;
