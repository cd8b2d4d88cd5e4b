pub fn fixture_file_name(record_count: usize) -> String {
    format!("test_data_{record_count}.json")
}

pub fn function_name(runtime: &str, memory_size_mb: u32, record_count: usize) -> String {
    format!("perf-test-{runtime}-{memory_size_mb}-{record_count}")
}

/// Levels are numbered from 1 at the top of the topology.
pub fn state_machine_id(level: usize) -> String {
    format!("perf-test-level-{level}-state-machine")
}

pub fn parallel_state_name(width: usize, level: usize, level_count: usize) -> String {
    let label = if level == 1 && level_count > 1 {
        "top level".to_string()
    } else {
        format!("level {level}")
    };
    format!("Run {width} parallel executions ({label})")
}

pub fn invoke_task_state_name(branch: usize) -> String {
    format!("Run Lambda {branch}")
}

pub fn start_execution_state_name(target_level: usize, branch: usize) -> String {
    format!("Start Level {target_level} SFN {branch}")
}

pub fn caught_failure_state_name(task_state: &str) -> String {
    format!("{task_state} failed")
}
