//! The dynamic reasoning pipeline: plan, execute experts, synthesize, record.
//!
//! One `run` call is one logical task. Stages run strictly in sequence and
//! every stage failure is absorbed at that stage's boundary: the caller always
//! gets a well-formed trace. The single "fatal" path (planner stage threw)
//! still yields a degraded trace; it only suppresses expert execution and
//! synthesis via the sentinel rationale.

pub mod experts;
pub mod planner;
pub mod synthesizer;

use crate::oracle::ReasoningOracle;
use crate::persona::PersonaResolver;
use crate::provision::{Provision, ProvisionLookup};
use crate::scoring::ConfidenceSampler;
use crate::trace::{QueryContext, ReasoningStep, ReasoningTrace, StepStatus};
use crate::trace_store::TraceStore;
use chrono::Utc;
use planner::ReasoningPlan;
use serde_json::json;
use std::sync::Arc;

/// Final summary when the planner stage itself threw and nothing else ran.
const PLANNING_FAILED_SUMMARY: &str =
    "Planning stage failed; no further reasoning was performed.";

/// The orchestrator. Generic over its four seams so tests can pin every
/// external effect; the gateway instantiates it with the production set.
pub struct ReasoningPipeline<O, R, P, S> {
    oracle: O,
    resolver: R,
    provisions: P,
    sampler: S,
    store: Option<Arc<TraceStore>>,
}

impl<O, R, P, S> ReasoningPipeline<O, R, P, S>
where
    O: ReasoningOracle,
    R: PersonaResolver,
    P: ProvisionLookup,
    S: ConfidenceSampler,
{
    pub fn new(oracle: O, resolver: R, provisions: P, sampler: S) -> Self {
        Self {
            oracle,
            resolver,
            provisions,
            sampler,
            store: None,
        }
    }

    /// Attach a trace store; persisted under the task id after assembly.
    pub fn with_store(mut self, store: Arc<TraceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Execute one reasoning task end to end. Never fails: every stage error
    /// is folded into the returned trace.
    pub async fn run(&self, query: &str, provision_id: Option<&str>) -> ReasoningTrace {
        let task_id = format!("task_{}", uuid::Uuid::new_v4());
        let request_timestamp = Utc::now();
        tracing::info!(
            target: "ukfw::pipeline",
            task_id = %task_id,
            provision_id = provision_id.unwrap_or("none"),
            "reasoning task started"
        );

        let mut steps: Vec<ReasoningStep> = Vec::new();
        let mut history: Vec<String> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        let provision = self
            .fetch_provision(provision_id, &mut notes, &mut errors)
            .await;

        // Planner stage. A thrown stage error is the one "fatal" path: it
        // yields a synthetic error step and the sentinel plan.
        let planner_persona = self.resolver.planner_profile();
        let plan = match planner::run_planner(
            &self.oracle,
            &self.sampler,
            &planner_persona,
            query,
            provision.as_ref(),
        )
        .await
        {
            Ok((step, plan)) => {
                if step.status == StepStatus::ErrorParsingPlan {
                    errors.extend(step.issues_identified.iter().cloned());
                }
                steps.push(step);
                plan
            }
            Err(e) => {
                let detail = format!("Planner stage failed with an exception: {}", e);
                tracing::error!(target: "ukfw::pipeline", task_id = %task_id, "{}", detail);
                errors.push(detail.clone());
                steps.push(planner_failure_step(
                    &planner_persona,
                    query,
                    detail,
                    self.oracle.model_id(),
                ));
                ReasoningPlan::failed_sentinel()
            }
        };
        notes.push(format!(
            "Planner rationale: {}",
            plan.overall_strategy_rationale
        ));

        // Expert execution loop (no-op on an empty sequence).
        let expert_steps = experts::run_experts(
            &self.oracle,
            &self.resolver,
            &self.sampler,
            query,
            provision.as_ref(),
            &plan,
            &mut history,
            &mut errors,
        )
        .await;
        notes.push(format!(
            "Executed {} expert reasoning step(s).",
            expert_steps.len()
        ));
        steps.extend(expert_steps);

        // Synthesis runs even over an empty history after a parse failure;
        // only the sentinel rationale suppresses it.
        let final_summary = if plan.is_failed_sentinel() {
            notes.push("Synthesis skipped: planner stage failed.".to_string());
            PLANNING_FAILED_SUMMARY.to_string()
        } else {
            let synth_persona = self.resolver.synthesizer_profile();
            let (step, summary) = synthesizer::run_synthesizer(
                &self.oracle,
                &self.sampler,
                &synth_persona,
                query,
                provision.as_ref(),
                &plan.overall_strategy_rationale,
                &history,
            )
            .await;
            match step.status {
                StepStatus::Completed => notes.push("Synthesis performed.".to_string()),
                _ => {
                    errors.push(step.output_generated.clone());
                    notes.push("Synthesis failed; fallback summary used.".to_string());
                }
            }
            steps.push(step);
            summary
        };

        if !errors.is_empty() {
            notes.push(format!("{} error(s) encountered during the task.", errors.len()));
        }

        let trace = ReasoningTrace::assemble(
            task_id,
            request_timestamp,
            QueryContext {
                query: query.to_string(),
                provision_id: provision_id.map(String::from),
                provision_title: provision.as_ref().map(|p| p.title.clone()),
            },
            steps,
            final_summary,
            notes,
            errors,
        );

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&trace) {
                tracing::error!(
                    target: "ukfw::pipeline",
                    task_id = %trace.task_id,
                    "trace persistence failed: {}", e
                );
            }
        }

        tracing::info!(
            target: "ukfw::pipeline",
            task_id = %trace.task_id,
            steps = trace.steps.len(),
            confidence = trace.overall_confidence_score,
            "reasoning task finished"
        );
        trace
    }

    async fn fetch_provision(
        &self,
        provision_id: Option<&str>,
        notes: &mut Vec<String>,
        errors: &mut Vec<String>,
    ) -> Option<Provision> {
        let id = provision_id?;
        match self.provisions.get_provision_by_id(id).await {
            Ok(Some(p)) => {
                notes.push(format!("Grounding provision {} (\"{}\") loaded.", p.id, p.title));
                Some(p)
            }
            Ok(None) => {
                notes.push(format!(
                    "Provision '{}' not found; proceeding without grounding context.",
                    id
                ));
                None
            }
            Err(e) => {
                let detail = format!("Provision lookup failed for '{}': {}", id, e);
                tracing::warn!(target: "ukfw::pipeline", "{}", detail);
                errors.push(detail);
                None
            }
        }
    }
}

fn planner_failure_step(
    persona: &crate::persona::PersonaProfile,
    query: &str,
    error_text: String,
    model_used: &str,
) -> ReasoningStep {
    let now = Utc::now();
    ReasoningStep {
        step_id: format!("planner_{}", uuid::Uuid::new_v4()),
        description: error_text.clone(),
        model_used: model_used.to_string(),
        persona_profile_id: persona.profile_id.clone(),
        persona_display_name: persona.name.clone(),
        input_context: json!({ "query": query }),
        output_generated: error_text.clone(),
        confidence_score: None,
        knowledge_references: persona.source_references.clone(),
        parent_step_id: None,
        child_step_ids: Vec::new(),
        start_time: now,
        end_time: now,
        issues_identified: vec![error_text],
        associated_axes: persona.ukg_axes.clone(),
        status: StepStatus::Error,
        custom_step_data: serde_json::Map::new(),
    }
}
