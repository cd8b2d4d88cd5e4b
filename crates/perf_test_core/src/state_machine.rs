//! Step Functions (Amazon States Language) definitions for the fan-out.
//!
//! The innermost level invokes the task function directly from every
//! parallel branch. Each outer level starts the next level's state machine
//! synchronously, so a level only finishes when all of its branches have.
//! Every branch task catches its own errors into a terminal `Pass` state, so
//! one failed branch never fails the `Parallel` state or its siblings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::TopologyError;
use crate::naming::{
    caught_failure_state_name, invoke_task_state_name, parallel_state_name,
    start_execution_state_name, state_machine_id,
};
use crate::topology::FanOutTopology;

pub const START_EXECUTION_SYNC_RESOURCE: &str = "arn:aws:states:::states:startExecution.sync";
pub const ALL_ERRORS: &str = "States.ALL";
pub const ERROR_RESULT_PATH: &str = "$.error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationTarget {
    TaskFunction(String),
    StateMachine(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateMachineDefinition {
    pub level: usize,
    pub id: String,
    pub definition: Value,
}

/// Renders every level. `nested_arns[i]` is the ARN of the state machine
/// for level `i + 2`, so there is one entry per level below the top.
pub fn render_definitions(
    topology: &FanOutTopology,
    function_arn: &str,
    nested_arns: &[String],
) -> Result<Vec<StateMachineDefinition>, TopologyError> {
    let expected = topology.depth().saturating_sub(1);
    if nested_arns.len() != expected {
        return Err(TopologyError::NestedTargets {
            expected,
            actual: nested_arns.len(),
        });
    }

    (1..=topology.depth())
        .map(|level| {
            let target = if level == topology.depth() {
                InvocationTarget::TaskFunction(function_arn.to_string())
            } else {
                InvocationTarget::StateMachine(nested_arns[level - 1].clone())
            };
            Ok(StateMachineDefinition {
                level,
                id: state_machine_id(level),
                definition: level_definition(topology, level, &target)?,
            })
        })
        .collect()
}

pub fn level_definition(
    topology: &FanOutTopology,
    level: usize,
    target: &InvocationTarget,
) -> Result<Value, TopologyError> {
    let spec = topology
        .level(level)
        .ok_or(TopologyError::UnknownLevel { level })?;
    let parallel_name = parallel_state_name(spec.width, level, topology.depth());

    let branches: Vec<Value> = (0..spec.width)
        .map(|branch| branch_definition(level, branch, target))
        .collect();

    let mut states = Map::new();
    states.insert(
        parallel_name.clone(),
        json!({
            "Type": "Parallel",
            "Branches": branches,
            "End": true,
        }),
    );

    Ok(json!({
        "Comment": format!("{} (fan-out level {level})", state_machine_id(level)),
        "StartAt": parallel_name,
        "States": states,
        "TimeoutSeconds": spec.timeout_secs,
    }))
}

fn branch_definition(level: usize, branch: usize, target: &InvocationTarget) -> Value {
    let (name, mut state) = match target {
        InvocationTarget::TaskFunction(function_arn) => (
            invoke_task_state_name(branch),
            json!({
                "Type": "Task",
                "Resource": function_arn,
            }),
        ),
        InvocationTarget::StateMachine(state_machine_arn) => (
            start_execution_state_name(level + 1, branch),
            json!({
                "Type": "Task",
                "Resource": START_EXECUTION_SYNC_RESOURCE,
                "Parameters": {
                    "StateMachineArn": state_machine_arn,
                    "Input": {
                        "AWS_STEP_FUNCTIONS_STARTED_BY_EXECUTION_ID.$": "$$.Execution.Id",
                    },
                },
            }),
        ),
    };

    let failed = caught_failure_state_name(&name);
    state["End"] = json!(true);
    state["Catch"] = json!([{
        "ErrorEquals": [ALL_ERRORS],
        "ResultPath": ERROR_RESULT_PATH,
        "Next": failed,
    }]);

    let mut states = Map::new();
    states.insert(name.clone(), state);
    states.insert(failed, json!({ "Type": "Pass", "End": true }));
    json!({
        "StartAt": name,
        "States": states,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const FUNCTION_ARN: &str = "arn:aws:lambda:eu-west-1:123456789012:function:perf-test-rust";

    fn nested() -> Vec<String> {
        vec![
            "arn:aws:states:eu-west-1:123456789012:stateMachine:level-2".to_string(),
            "arn:aws:states:eu-west-1:123456789012:stateMachine:level-3".to_string(),
        ]
    }

    #[test]
    fn renders_one_definition_per_level() {
        let definitions = render_definitions(&FanOutTopology::standard(), FUNCTION_ARN, &nested())
            .expect("definitions should render");

        let ids: Vec<&str> = definitions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "perf-test-level-1-state-machine",
                "perf-test-level-2-state-machine",
                "perf-test-level-3-state-machine",
            ]
        );
        for definition in &definitions {
            assert_eq!(definition.definition["TimeoutSeconds"], json!(10_800));
        }
    }

    #[test]
    fn innermost_level_invokes_the_task_function() {
        let definitions = render_definitions(&FanOutTopology::standard(), FUNCTION_ARN, &nested())
            .expect("definitions should render");
        let level_three = &definitions[2].definition;

        assert_eq!(
            level_three["StartAt"],
            json!("Run 10 parallel executions (level 3)")
        );
        let branches = level_three["States"]["Run 10 parallel executions (level 3)"]["Branches"]
            .as_array()
            .expect("branches should be an array");
        assert_eq!(branches.len(), 10);
        assert_eq!(
            branches[4]["States"]["Run Lambda 4"]["Resource"],
            json!(FUNCTION_ARN)
        );
    }

    #[test]
    fn outer_levels_start_the_next_level_synchronously() {
        let definitions = render_definitions(&FanOutTopology::standard(), FUNCTION_ARN, &nested())
            .expect("definitions should render");
        let top = &definitions[0].definition;

        let branches = top["States"]["Run 10 parallel executions (top level)"]["Branches"]
            .as_array()
            .expect("branches should be an array");
        let task = &branches[0]["States"]["Start Level 2 SFN 0"];
        assert_eq!(task["Resource"], json!(START_EXECUTION_SYNC_RESOURCE));
        assert_eq!(task["Parameters"]["StateMachineArn"], json!(nested()[0]));

        let middle = &definitions[1].definition;
        let middle_task = &middle["States"]["Run 10 parallel executions (level 2)"]["Branches"][9]
            ["States"]["Start Level 3 SFN 9"];
        assert_eq!(middle_task["Parameters"]["StateMachineArn"], json!(nested()[1]));
    }

    #[test]
    fn every_branch_task_catches_its_own_failure() {
        let definitions = render_definitions(&FanOutTopology::standard(), FUNCTION_ARN, &nested())
            .expect("definitions should render");

        let cases = [
            (
                &definitions[0].definition,
                "Run 10 parallel executions (top level)",
                "Start Level 2 SFN 3",
            ),
            (
                &definitions[1].definition,
                "Run 10 parallel executions (level 2)",
                "Start Level 3 SFN 3",
            ),
            (
                &definitions[2].definition,
                "Run 10 parallel executions (level 3)",
                "Run Lambda 3",
            ),
        ];
        for (definition, parallel, task_name) in cases {
            let branch_states = &definition["States"][parallel]["Branches"][3]["States"];
            let task = &branch_states[task_name];
            let failed = format!("{task_name} failed");

            assert_eq!(task["End"], json!(true));
            assert_eq!(
                task["Catch"],
                json!([{
                    "ErrorEquals": ["States.ALL"],
                    "ResultPath": "$.error",
                    "Next": failed,
                }])
            );
            assert_eq!(branch_states[failed.as_str()], json!({ "Type": "Pass", "End": true }));
        }
    }

    #[test]
    fn rejects_wrong_number_of_nested_targets() {
        let error = render_definitions(&FanOutTopology::standard(), FUNCTION_ARN, &[])
            .expect_err("missing nested targets should fail");
        assert_eq!(
            error,
            TopologyError::NestedTargets {
                expected: 2,
                actual: 0
            }
        );
    }

    #[test]
    fn single_level_topology_needs_no_nested_targets() {
        let topology =
            FanOutTopology::uniform(1, 3, Duration::from_secs(60)).expect("topology should build");
        let definitions =
            render_definitions(&topology, FUNCTION_ARN, &[]).expect("definitions should render");
        assert_eq!(definitions.len(), 1);
        assert_eq!(
            level_definition(&topology, 2, &InvocationTarget::TaskFunction(String::new())),
            Err(TopologyError::UnknownLevel { level: 2 })
        );
    }
}
