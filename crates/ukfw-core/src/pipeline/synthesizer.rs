//! Synthesizer Stage: consolidate the expert history into one answer.
//!
//! Runs even after a plan parse failure (over an empty history); skipped only
//! when the planner stage itself threw. An oracle failure here degrades the
//! final summary to a fixed fallback; the trace is still returned.

use crate::oracle::ReasoningOracle;
use crate::persona::PersonaProfile;
use crate::provision::Provision;
use crate::scoring::ConfidenceSampler;
use crate::trace::{ReasoningStep, StepStatus};
use chrono::Utc;
use serde_json::json;

/// Final summary used when the synthesis oracle call fails.
pub const SYNTHESIS_FALLBACK_SUMMARY: &str =
    "Synthesis failed; review individual reasoning steps.";

const SYNTHESIZER_CONFIDENCE_RANGE: (f64, f64) = (0.85, 0.99);

fn synthesis_prompt(
    query: &str,
    provision: Option<&Provision>,
    plan_rationale: &str,
    history: &[String],
) -> String {
    let mut parts = vec![format!(
        "Consolidate the expert findings below into one coherent answer to the original query: \"{}\"",
        query
    )];
    if let Some(p) = provision {
        parts.push(format!(
            "The analysis was grounded in provision {} (\"{}\"); keep the answer anchored to it.",
            p.id, p.title
        ));
    }
    if !plan_rationale.is_empty() {
        parts.push(format!("The planner's overall strategy was: {}", plan_rationale));
    }
    if history.is_empty() {
        parts.push(
            "No expert findings were produced. Answer the query directly from the \
             available context and state that no expert analysis was available."
                .to_string(),
        );
    } else {
        parts.push(format!("Expert findings, in order:\n{}", history.join("\n")));
    }
    parts.push(
        "Integrate the findings rather than concatenating them. Address the query directly. \
         If the experts disagree or express uncertainty, surface that explicitly."
            .to_string(),
    );
    parts.join("\n\n")
}

/// Run the synthesizer. Returns the synthesis step and the final response
/// summary (the step's output on success, the fixed fallback on failure).
pub async fn run_synthesizer(
    oracle: &dyn ReasoningOracle,
    sampler: &dyn ConfidenceSampler,
    profile: &PersonaProfile,
    query: &str,
    provision: Option<&Provision>,
    plan_rationale: &str,
    history: &[String],
) -> (ReasoningStep, String) {
    let start_time = Utc::now();
    let prompt = synthesis_prompt(query, provision, plan_rationale, history);
    let instructions = profile.prompt_header();

    tracing::info!(
        target: "ukfw::synthesizer",
        history_entries = history.len(),
        "synthesis stage invoking oracle"
    );

    let input_context = json!({
        "query": query,
        "persona_config": profile,
        "history_entries": history.len(),
        "provision_id": provision.map(|p| p.id.clone()),
    });

    match oracle.generate(&prompt, &instructions).await {
        Ok(output) => {
            let end_time = Utc::now();
            let (lo, hi) = SYNTHESIZER_CONFIDENCE_RANGE;
            let step = ReasoningStep {
                step_id: format!("synth_{}", uuid::Uuid::new_v4()),
                description: format!(
                    "{} consolidating {} expert finding(s) into the final answer.",
                    profile.name,
                    history.len()
                ),
                model_used: oracle.model_id().to_string(),
                persona_profile_id: profile.profile_id.clone(),
                persona_display_name: profile.name.clone(),
                input_context,
                output_generated: output.clone(),
                confidence_score: Some(sampler.sample(lo, hi)),
                knowledge_references: profile.source_references.clone(),
                parent_step_id: None,
                child_step_ids: Vec::new(),
                start_time,
                end_time,
                issues_identified: Vec::new(),
                associated_axes: profile.ukg_axes.clone(),
                status: StepStatus::Completed,
                custom_step_data: serde_json::Map::new(),
            };
            (step, output)
        }
        Err(e) => {
            tracing::warn!(target: "ukfw::synthesizer", "synthesis failed: {}", e);
            let end_time = Utc::now();
            let error_text = format!("Synthesis oracle invocation failed: {}", e);
            let step = ReasoningStep {
                step_id: format!("synth_{}", uuid::Uuid::new_v4()),
                description: format!("{} synthesis step failed.", profile.name),
                model_used: oracle.model_id().to_string(),
                persona_profile_id: profile.profile_id.clone(),
                persona_display_name: profile.name.clone(),
                input_context,
                output_generated: error_text.clone(),
                confidence_score: None,
                knowledge_references: profile.source_references.clone(),
                parent_step_id: None,
                child_step_ids: Vec::new(),
                start_time,
                end_time,
                issues_identified: vec![error_text],
                associated_axes: profile.ukg_axes.clone(),
                status: StepStatus::Error,
                custom_step_data: serde_json::Map::new(),
            };
            (step, SYNTHESIS_FALLBACK_SUMMARY.to_string())
        }
    }
}
