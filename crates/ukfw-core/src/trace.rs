//! Reasoning steps and the per-task audit trace.
//!
//! A `ReasoningTrace` is the complete record returned to the caller and
//! persisted under its task id. The three set-valued fields
//! (`personas_involved_ids`, `reasoning_models_used`, `ukg_axes_queried`) are
//! always derived from `steps`; `assemble` is the only place they are filled.

use crate::persona::SourceReference;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Outcome tag for one executed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Error,
    ErrorParsingPlan,
}

/// One executed stage: full input/output/status record.
///
/// Invariant: `status == Completed` implies non-empty `output_generated` and a
/// `confidence_score` (when present) in [0, 1]. An error step's output equals
/// its own error description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_id: String,
    pub description: String,
    pub model_used: String,
    pub persona_profile_id: String,
    pub persona_display_name: String,
    /// Open-ended input payload; at minimum the query and persona configuration.
    pub input_context: Value,
    pub output_generated: String,
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub knowledge_references: Vec<SourceReference>,
    /// Reserved for hierarchical decomposition; unused here but round-trips.
    #[serde(default)]
    pub parent_step_id: Option<String>,
    #[serde(default)]
    pub child_step_ids: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub issues_identified: Vec<String>,
    #[serde(default)]
    pub associated_axes: Vec<String>,
    pub status: StepStatus,
    /// Stage-specific payload; the planner stores its parsed plan here.
    #[serde(default)]
    pub custom_step_data: serde_json::Map<String, Value>,
}

/// Original query context carried on the trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryContext {
    pub query: String,
    #[serde(default)]
    pub provision_id: Option<String>,
    #[serde(default)]
    pub provision_title: Option<String>,
}

/// Top-level audit record for one reasoning task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub task_id: String,
    pub request_timestamp: DateTime<Utc>,
    pub original_query: QueryContext,
    pub final_response_summary: String,
    pub overall_confidence_score: f64,
    /// Reserved for recursive refinement; always 0 in this pipeline.
    pub total_refinement_iterations: u32,
    pub steps: Vec<ReasoningStep>,
    pub personas_involved_ids: Vec<String>,
    pub reasoning_models_used: Vec<String>,
    pub ukg_axes_queried: Vec<String>,
    pub audit_trail_notes: Vec<String>,
    pub errors_encountered: Vec<String>,
}

/// Mean of all non-null per-step confidence scores; 0.0 when none carry one.
pub fn aggregate_confidence(steps: &[ReasoningStep]) -> f64 {
    let scores: Vec<f64> = steps.iter().filter_map(|s| s.confidence_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

impl ReasoningTrace {
    /// Build the trace from its parts, deriving the three set-valued fields
    /// as the exact union over `steps` (sorted for deterministic output).
    pub fn assemble(
        task_id: String,
        request_timestamp: DateTime<Utc>,
        original_query: QueryContext,
        steps: Vec<ReasoningStep>,
        final_response_summary: String,
        audit_trail_notes: Vec<String>,
        errors_encountered: Vec<String>,
    ) -> Self {
        let personas: BTreeSet<String> = steps
            .iter()
            .map(|s| s.persona_profile_id.clone())
            .collect();
        let models: BTreeSet<String> = steps.iter().map(|s| s.model_used.clone()).collect();
        let axes: BTreeSet<String> = steps
            .iter()
            .flat_map(|s| s.associated_axes.iter().cloned())
            .collect();
        let overall_confidence_score = aggregate_confidence(&steps);

        Self {
            task_id,
            request_timestamp,
            original_query,
            final_response_summary,
            overall_confidence_score,
            total_refinement_iterations: 0,
            steps,
            personas_involved_ids: personas.into_iter().collect(),
            reasoning_models_used: models.into_iter().collect(),
            ukg_axes_queried: axes.into_iter().collect(),
            audit_trail_notes,
            errors_encountered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, persona: &str, model: &str, axes: &[&str], conf: Option<f64>) -> ReasoningStep {
        let now = Utc::now();
        ReasoningStep {
            step_id: id.to_string(),
            description: format!("step {}", id),
            model_used: model.to_string(),
            persona_profile_id: persona.to_string(),
            persona_display_name: persona.to_string(),
            input_context: json!({"query": "q"}),
            output_generated: "out".to_string(),
            confidence_score: conf,
            knowledge_references: Vec::new(),
            parent_step_id: None,
            child_step_ids: Vec::new(),
            start_time: now,
            end_time: now,
            issues_identified: Vec::new(),
            associated_axes: axes.iter().map(|s| s.to_string()).collect(),
            status: StepStatus::Completed,
            custom_step_data: serde_json::Map::new(),
        }
    }

    #[test]
    fn aggregate_is_mean_of_present_scores() {
        let steps = vec![
            step("a", "p1", "m1", &[], Some(0.8)),
            step("b", "p2", "m1", &[], None),
            step("c", "p3", "m2", &[], Some(0.4)),
        ];
        let agg = aggregate_confidence(&steps);
        assert!((agg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn aggregate_without_scores_is_zero() {
        let steps = vec![step("a", "p1", "m1", &[], None)];
        assert_eq!(aggregate_confidence(&steps), 0.0);
    }

    #[test]
    fn assemble_derives_exact_unions() {
        let steps = vec![
            step("a", "p1", "m1", &["AX1", "AX2"], Some(0.9)),
            step("b", "p2", "m1", &["AX2", "AX3"], Some(0.7)),
            step("c", "p1", "m2", &[], None),
        ];
        let trace = ReasoningTrace::assemble(
            "task_1".to_string(),
            Utc::now(),
            QueryContext {
                query: "q".to_string(),
                provision_id: None,
                provision_title: None,
            },
            steps,
            "summary".to_string(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(trace.personas_involved_ids, vec!["p1", "p2"]);
        assert_eq!(trace.reasoning_models_used, vec!["m1", "m2"]);
        assert_eq!(trace.ukg_axes_queried, vec!["AX1", "AX2", "AX3"]);
        assert_eq!(trace.total_refinement_iterations, 0);
        assert!((trace.overall_confidence_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn step_round_trips_hierarchy_fields() {
        let mut s = step("a", "p1", "m1", &[], None);
        s.parent_step_id = Some("root".to_string());
        s.child_step_ids = vec!["a.1".to_string()];
        let json = serde_json::to_string(&s).unwrap();
        let back: ReasoningStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parent_step_id.as_deref(), Some("root"));
        assert_eq!(back.child_step_ids, vec!["a.1"]);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepStatus::ErrorParsingPlan).unwrap(),
            "\"error_parsing_plan\""
        );
    }
}
