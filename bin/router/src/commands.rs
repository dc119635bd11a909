//! Router command implementations.
//!
//! Each command reads a workflow definition document from disk and produces
//! a JSON value for stdout plus a success flag for the exit status.

use crate::config::RouterConfig;
use crate::error::CliError;
use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use waypoint_core::StageId;
use waypoint_workflow::{
    EvaluationRequest, GraphMutation, RoutingEngine, SubmittedData, Workflow, WorkflowSummary,
};

/// The result of a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Printed to stdout.
    pub value: JsonValue,
    /// Whether the command should exit successfully.
    pub success: bool,
}

impl Output {
    fn ok(value: JsonValue) -> Self {
        Self {
            value,
            success: true,
        }
    }

    /// Renders the value as JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn render(&self, pretty: bool) -> Result<String, Report<CliError>> {
        let rendered = if pretty {
            serde_json::to_string_pretty(&self.value)
        } else {
            serde_json::to_string(&self.value)
        };
        rendered.map_err(|e| {
            CliError::Serialize {
                details: e.to_string(),
            }
            .into()
        })
    }
}

/// Where the submitted data for a routing request comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestSource {
    /// A stage ID and an optional inline JSON object.
    Inline {
        stage_id: StageId,
        data: Option<String>,
    },
    /// A file holding a full evaluation request.
    File(PathBuf),
}

/// Reads and parses a workflow definition document.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a workflow.
pub fn load_workflow(path: &Path) -> Result<Workflow, Report<CliError>> {
    let document = read(path)?;
    let workflow = Workflow::from_json(&document).map_err(|e| CliError::InvalidDocument {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    debug!(
        path = %path.display(),
        workflow_id = %workflow.id,
        stages = workflow.stages.len(),
        "loaded workflow"
    );
    Ok(workflow)
}

/// Validates a workflow, listing every violation.
///
/// # Errors
///
/// Returns an error if the workflow cannot be loaded.
pub fn validate(path: &Path) -> Result<Output, Report<CliError>> {
    let workflow = load_workflow(path)?;
    Ok(match workflow.validate() {
        Ok(()) => Output::ok(json!({ "valid": true, "violations": [] })),
        Err(report) => {
            info!(workflow_id = %workflow.id, violations = report.len(), "workflow is invalid");
            Output {
                value: json!({ "valid": false, "violations": to_value(&report.violations)? }),
                success: false,
            }
        }
    })
}

/// Describes a workflow and the structural status of each stage.
///
/// # Errors
///
/// Returns an error if the workflow cannot be loaded.
pub fn inspect(path: &Path) -> Result<Output, Report<CliError>> {
    let workflow = load_workflow(path)?;
    let stages = workflow
        .stages
        .stages()
        .iter()
        .map(|stage| -> Result<JsonValue, Report<CliError>> {
            let routes: Vec<String> = stage
                .conditional_routes
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(json!({
                "id": stage.id,
                "name": stage.name,
                "order": stage.order,
                "stage_type": stage.stage_type,
                "status": to_value(&workflow.stage_status(&stage.id))?,
                "sla_hours": stage.sla_hours,
                "routes": routes,
            }))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Output::ok(json!({
        "summary": to_value(&WorkflowSummary::from(&workflow))?,
        "stages": stages,
    })))
}

/// Lists the stages a new route from `stage_id` may target.
///
/// # Errors
///
/// Returns an error if the workflow cannot be loaded or has no such stage.
pub fn candidates(path: &Path, stage_id: &StageId) -> Result<Output, Report<CliError>> {
    let workflow = load_workflow(path)?;
    if workflow.stage(stage_id).is_none() {
        return Err(CliError::InvalidArgument {
            name: "stage",
            details: format!("no stage {stage_id} in workflow {}", workflow.id),
        }
        .into());
    }
    let targets: Vec<JsonValue> = workflow
        .stages
        .route_candidates(stage_id)
        .into_iter()
        .map(|stage| json!({ "id": stage.id, "name": stage.name, "order": stage.order }))
        .collect();
    Ok(Output::ok(JsonValue::Array(targets)))
}

/// Answers a routing request.
///
/// # Errors
///
/// Returns an error if the workflow or request cannot be loaded, the
/// workflow is invalid while `require_valid` is set, or the stage is unknown.
pub fn route(
    config: &RouterConfig,
    path: &Path,
    source: RequestSource,
) -> Result<Output, Report<CliError>> {
    let workflow = load_workflow(path)?;
    let request = build_request(source)?;

    let engine = if config.require_valid {
        RoutingEngine::new(workflow).map_err(|e| CliError::RoutingFailed {
            details: e.to_string(),
        })?
    } else {
        RoutingEngine::unchecked(workflow)
    };

    let response = engine.route(&request).map_err(|e| CliError::RoutingFailed {
        details: e.to_string(),
    })?;
    Ok(Output::ok(to_value(&response)?))
}

/// Applies one mutation or a JSON array of mutations to a workflow.
///
/// When the result is valid it is printed and, with `output`, written to
/// disk. Otherwise the violations are printed and nothing is written.
///
/// # Errors
///
/// Returns an error if the inputs cannot be read, a mutation is rejected, or
/// the output cannot be written.
pub fn edit(
    config: &RouterConfig,
    path: &Path,
    mutations: &str,
    output: Option<&Path>,
) -> Result<Output, Report<CliError>> {
    let workflow = load_workflow(path)?;
    let mutations = parse_mutations(mutations)?;
    let moved = mutations
        .iter()
        .any(|m| matches!(m, GraphMutation::MoveStage { .. }));

    let mut edited = workflow
        .apply_all(mutations)
        .map_err(|e| CliError::EditRejected {
            details: e.to_string(),
        })?;

    if moved && config.prune_on_move {
        let pruned = edited.stages.backward_routes();
        if !pruned.is_empty() {
            edited = edited
                .apply(GraphMutation::PruneBackwardRoutes)
                .map_err(|e| CliError::EditRejected {
                    details: e.to_string(),
                })?;
            info!(count = pruned.len(), "pruned backward routes after move");
        }
    }

    if let Err(report) = edited.validate() {
        warn!(violations = report.len(), "edited workflow is invalid and was not saved");
        return Ok(Output {
            value: json!({ "valid": false, "violations": to_value(&report.violations)? }),
            success: false,
        });
    }

    if let Some(output) = output {
        let document = if config.pretty {
            edited.to_json_pretty()
        } else {
            edited.to_json()
        }
        .map_err(|e| CliError::Serialize {
            details: e.to_string(),
        })?;
        std::fs::write(output, document).map_err(|e| CliError::WriteOutput {
            path: output.to_path_buf(),
            details: e.to_string(),
        })?;
        info!(path = %output.display(), "saved edited workflow");
    }

    Ok(Output::ok(to_value(&edited)?))
}

fn build_request(source: RequestSource) -> Result<EvaluationRequest, Report<CliError>> {
    match source {
        RequestSource::Inline { stage_id, data } => {
            let submitted_data = match data {
                Some(raw) => serde_json::from_str::<SubmittedData>(&raw).map_err(|e| {
                    CliError::InvalidArgument {
                        name: "data",
                        details: e.to_string(),
                    }
                })?,
                None => SubmittedData::new(),
            };
            Ok(EvaluationRequest::new(stage_id, submitted_data))
        }
        RequestSource::File(path) => {
            let raw = read(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                CliError::InvalidArgument {
                    name: "request",
                    details: e.to_string(),
                }
                .into()
            })
        }
    }
}

fn parse_mutations(raw: &str) -> Result<Vec<GraphMutation>, Report<CliError>> {
    let value: JsonValue = serde_json::from_str(raw).map_err(|e| CliError::InvalidArgument {
        name: "mutation",
        details: e.to_string(),
    })?;
    let parsed = match value {
        JsonValue::Array(_) => serde_json::from_value(value),
        single => serde_json::from_value(single).map(|m| vec![m]),
    };
    parsed.map_err(|e| {
        CliError::InvalidArgument {
            name: "mutation",
            details: e.to_string(),
        }
        .into()
    })
}

fn read(path: &Path) -> Result<String, Report<CliError>> {
    std::fs::read_to_string(path).map_err(|e| {
        CliError::ReadInput {
            path: path.to_path_buf(),
            details: e.to_string(),
        }
        .into()
    })
}

fn to_value(value: &impl Serialize) -> Result<JsonValue, Report<CliError>> {
    serde_json::to_value(value).map_err(|e| {
        CliError::Serialize {
            details: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SUPPORT: &str = r#"{
        "id": "wf_support",
        "name": "Support",
        "category": "support",
        "triggers": ["form"],
        "stages": [
            {
                "id": "intake",
                "name": "Intake",
                "order": 0,
                "conditional_routes": [
                    {
                        "id": "urgent",
                        "next_stage_id": "escalation",
                        "conditions": [{"field": "urgency", "operator": "==", "value": "high"}]
                    },
                    {"id": "fallback", "next_stage_id": "standard", "conditions": []}
                ]
            },
            {"id": "escalation", "name": "Escalation", "order": 1},
            {"id": "standard", "name": "Standard", "order": 2}
        ]
    }"#;

    fn write_workflow(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("workflow.json");
        fs::write(&path, contents).expect("write workflow");
        path
    }

    fn inline(stage: &str, data: &str) -> RequestSource {
        RequestSource::Inline {
            stage_id: stage.parse().expect("id"),
            data: Some(data.to_string()),
        }
    }

    #[test]
    fn validate_accepts_well_formed_workflow() {
        let dir = TempDir::new().expect("tempdir");
        let output = validate(&write_workflow(&dir, SUPPORT)).expect("validate");
        assert!(output.success);
        assert_eq!(output.value["valid"], json!(true));
    }

    #[test]
    fn validate_lists_violations() {
        let dir = TempDir::new().expect("tempdir");
        let broken = SUPPORT.replace("\"order\": 2", "\"order\": 0");
        let output = validate(&write_workflow(&dir, &broken)).expect("validate");
        assert!(!output.success);
        let kinds: Vec<&str> = output.value["violations"]
            .as_array()
            .expect("violations")
            .iter()
            .filter_map(|v| v["kind"].as_str())
            .collect();
        assert!(kinds.contains(&"duplicate_stage_order"));
        assert!(kinds.contains(&"backward_route"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = validate(&dir.path().join("nope.json")).expect_err("missing");
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn route_follows_first_match_and_fallback() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let config = RouterConfig::default();

        let high = route(&config, &path, inline("intake", r#"{"urgency": "high"}"#)).expect("route");
        let low = route(&config, &path, inline("intake", r#"{"urgency": "low"}"#)).expect("route");
        let done = route(&config, &path, inline("standard", "{}")).expect("route");

        assert_eq!(high.value, json!({"next_stage_id": "escalation"}));
        assert_eq!(low.value, json!({"next_stage_id": "standard"}));
        assert_eq!(done.value, json!({"complete": true}));
    }

    #[test]
    fn route_reads_request_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let request = dir.path().join("request.json");
        fs::write(
            &request,
            r#"{"stage_id": "intake", "submitted_data": {"urgency": "high"}}"#,
        )
        .expect("write request");

        let output =
            route(&RouterConfig::default(), &path, RequestSource::File(request)).expect("route");
        assert_eq!(output.value, json!({"next_stage_id": "escalation"}));
    }

    #[test]
    fn route_rejects_non_object_data() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let err = route(&RouterConfig::default(), &path, inline("intake", "[1, 2]"))
            .expect_err("not an object");
        assert!(err.to_string().contains("invalid --data"));
    }

    #[test]
    fn route_respects_require_valid() {
        let dir = TempDir::new().expect("tempdir");
        let broken = SUPPORT.replace("\"name\": \"Support\"", "\"name\": \"\"");
        let path = write_workflow(&dir, &broken);

        let strict = RouterConfig::default();
        assert!(route(&strict, &path, inline("intake", "{}")).is_err());

        let lenient = RouterConfig {
            require_valid: false,
            ..RouterConfig::default()
        };
        let output = route(&lenient, &path, inline("intake", "{}")).expect("route");
        assert_eq!(output.value, json!({"next_stage_id": "standard"}));
    }

    #[test]
    fn inspect_reports_stage_status() {
        let dir = TempDir::new().expect("tempdir");
        let output = inspect(&write_workflow(&dir, SUPPORT)).expect("inspect");

        assert_eq!(output.value["summary"]["stage_count"], json!(3));
        assert_eq!(output.value["summary"]["route_count"], json!(2));
        assert_eq!(output.value["stages"][0]["status"], json!("valid"));
        assert_eq!(
            output.value["stages"][0]["routes"][0],
            json!("urgency == \"high\" -> escalation")
        );
    }

    #[test]
    fn candidates_are_later_stages() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let output = candidates(&path, &"escalation".parse().expect("id")).expect("candidates");
        assert_eq!(output.value, json!([{"id": "standard", "name": "Standard", "order": 2}]));
    }

    #[test]
    fn edit_flags_backward_routes_after_move() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let saved = dir.path().join("saved.json");
        let mutation = r#"{"action": "move_stage", "stage_id": "escalation", "direction": "up"}"#;

        let output =
            edit(&RouterConfig::default(), &path, mutation, Some(&saved)).expect("edit");
        assert!(!output.success);
        assert!(!saved.exists());
    }

    #[test]
    fn edit_prunes_on_move_when_configured() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let saved = dir.path().join("saved.json");
        let config = RouterConfig {
            prune_on_move: true,
            ..RouterConfig::default()
        };
        let mutation = r#"{"action": "move_stage", "stage_id": "escalation", "direction": "up"}"#;

        let output = edit(&config, &path, mutation, Some(&saved)).expect("edit");
        assert!(output.success);

        let reloaded = load_workflow(&saved).expect("reload");
        let intake = reloaded.stage(&"intake".parse().expect("id")).expect("intake");
        assert_eq!(intake.conditional_routes.len(), 1);
        assert_eq!(intake.conditional_routes[0].next_stage_id.as_str(), "standard");
    }

    #[test]
    fn edit_applies_mutation_batches() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let mutations = r#"[
            {"action": "delete_stage", "stage_id": "escalation"},
            {"action": "add_stage", "name": "Archive"}
        ]"#;

        let output = edit(&RouterConfig::default(), &path, mutations, None).expect("edit");
        assert!(output.success);
        let stages = output.value["stages"].as_array().expect("stages");
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2]["name"], json!("Archive"));
        assert_eq!(stages[0]["conditional_routes"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn rejected_edit_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_workflow(&dir, SUPPORT);
        let mutation = r#"{"action": "add_route", "from": "standard", "to": "intake"}"#;
        let err = edit(&RouterConfig::default(), &path, mutation, None).expect_err("backward");
        assert!(err.to_string().contains("edit rejected"));
    }
}
