pub mod fanout;
pub mod logs;
pub mod task;
