//! Expert Execution Loop: run the planned archetypes in strict order.
//!
//! Failure isolation is per entry. An unknown archetype is skipped with a
//! warning (no step at all); a resolver or oracle failure yields an
//! error-status step and the loop continues. History is append-only and only
//! completed steps contribute a summary to it.

use crate::oracle::ReasoningOracle;
use crate::persona::{ExpertArchetype, PersonaProfile, PersonaResolver};
use crate::pipeline::planner::{PlannedStep, ReasoningPlan};
use crate::provision::Provision;
use crate::scoring::ConfidenceSampler;
use crate::trace::{ReasoningStep, StepStatus};
use chrono::Utc;
use serde_json::json;

/// Formatted history entry for one completed step.
pub fn history_entry(step: &ReasoningStep) -> String {
    let confidence = match step.confidence_score {
        Some(c) => format!("{:.2}", c),
        None => "N/A".to_string(),
    };
    format!(
        "Summary from {} ({}):\n{}\nConfidence: {}\n",
        step.persona_display_name, step.persona_profile_id, step.output_generated, confidence
    )
}

fn expert_prompt(
    query: &str,
    provision: Option<&Provision>,
    plan_rationale: &str,
    focus: &str,
) -> String {
    let mut parts = vec![format!("Original query: \"{}\"", query)];
    if let Some(p) = provision {
        parts.push(format!(
            "Grounding provision: {} (\"{}\"). Anchor your analysis to it.",
            p.id, p.title
        ));
    }
    if !plan_rationale.is_empty() {
        parts.push(format!(
            "The orchestrating planner's strategy rationale (treat as your primary instruction): {}",
            plan_rationale
        ));
    }
    if !focus.is_empty() {
        parts.push(format!("Your specific focus for this step: {}", focus));
    }
    parts.join("\n\n")
}

fn role_instructions(profile: &PersonaProfile, archetype: ExpertArchetype, history: &[String]) -> String {
    let mut s = format!(
        "{}\n\n{}",
        profile.prompt_header(),
        archetype.analysis_directive()
    );
    if !history.is_empty() {
        s.push_str("\n\nFindings from prior experts in this task:\n");
        s.push_str(&history.join("\n"));
    }
    s
}

fn error_step(
    archetype: ExpertArchetype,
    profile: Option<&PersonaProfile>,
    query: &str,
    focus: &str,
    error_text: String,
    model_used: String,
) -> ReasoningStep {
    let now = Utc::now();
    ReasoningStep {
        step_id: format!("{}_{}", archetype.step_prefix(), uuid::Uuid::new_v4()),
        description: format!("{} step failed: {}", archetype.as_str(), error_text),
        model_used,
        persona_profile_id: profile
            .map(|p| p.profile_id.clone())
            .unwrap_or_else(|| format!("unresolved-{}", archetype.step_prefix())),
        persona_display_name: profile
            .map(|p| p.name.clone())
            .unwrap_or_else(|| archetype.as_str().to_string()),
        input_context: json!({
            "query": query,
            "archetype": archetype.as_str(),
            "focus": focus,
        }),
        output_generated: error_text.clone(),
        confidence_score: None,
        knowledge_references: profile
            .map(|p| p.source_references.clone())
            .unwrap_or_default(),
        parent_step_id: None,
        child_step_ids: Vec::new(),
        start_time: now,
        end_time: now,
        issues_identified: vec![error_text],
        associated_axes: profile.map(|p| p.ukg_axes.clone()).unwrap_or_default(),
        status: StepStatus::Error,
        custom_step_data: serde_json::Map::new(),
    }
}

/// Execute the plan's entries in order, appending completed-step summaries to
/// `history` and stage failures to `errors`. Returns the expert steps in
/// strict planned order.
pub async fn run_experts(
    oracle: &dyn ReasoningOracle,
    resolver: &dyn PersonaResolver,
    sampler: &dyn ConfidenceSampler,
    query: &str,
    provision: Option<&Provision>,
    plan: &ReasoningPlan,
    history: &mut Vec<String>,
    errors: &mut Vec<String>,
) -> Vec<ReasoningStep> {
    let mut steps = Vec::new();
    for planned in &plan.reasoning_sequence {
        let archetype = match ExpertArchetype::from_str(&planned.archetype) {
            Some(a) => a,
            None => {
                let note = format!(
                    "Planner requested unknown archetype '{}'; entry skipped.",
                    planned.archetype
                );
                tracing::warn!(target: "ukfw::experts", "{}", note);
                errors.push(note);
                continue;
            }
        };
        let step = run_expert_step(
            oracle,
            resolver,
            sampler,
            query,
            provision,
            &plan.overall_strategy_rationale,
            planned,
            archetype,
            history,
        )
        .await;
        match step.status {
            StepStatus::Completed => history.push(history_entry(&step)),
            _ => errors.push(step.output_generated.clone()),
        }
        steps.push(step);
    }
    steps
}

#[allow(clippy::too_many_arguments)]
async fn run_expert_step(
    oracle: &dyn ReasoningOracle,
    resolver: &dyn PersonaResolver,
    sampler: &dyn ConfidenceSampler,
    query: &str,
    provision: Option<&Provision>,
    plan_rationale: &str,
    planned: &PlannedStep,
    archetype: ExpertArchetype,
    history: &[String],
) -> ReasoningStep {
    let start_time = Utc::now();
    let profile = match resolver.resolve(query, archetype).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(
                target: "ukfw::experts",
                archetype = archetype.as_str(),
                "persona resolution failed: {}", e
            );
            return error_step(
                archetype,
                None,
                query,
                &planned.focus,
                format!("Persona resolution failed: {}", e),
                "N/A".to_string(),
            );
        }
    };

    let prompt = expert_prompt(query, provision, plan_rationale, &planned.focus);
    let instructions = role_instructions(&profile, archetype, history);
    tracing::info!(
        target: "ukfw::experts",
        archetype = archetype.as_str(),
        persona = %profile.profile_id,
        "expert stage invoking oracle"
    );

    match oracle.generate(&prompt, &instructions).await {
        Ok(output) => {
            let end_time = Utc::now();
            let (lo, hi) = archetype.confidence_range();
            let mut input_context = json!({
                "query": query,
                "focus": planned.focus,
                "planner_rationale": plan_rationale,
                "persona_config": profile,
            });
            if let Some(p) = provision {
                input_context["provision_id"] = json!(p.id);
            }
            ReasoningStep {
                step_id: format!("{}_{}", archetype.step_prefix(), uuid::Uuid::new_v4()),
                description: format!(
                    "{} ({}) analyzing: {}",
                    profile.name,
                    archetype.as_str(),
                    if planned.focus.is_empty() {
                        query
                    } else {
                        planned.focus.as_str()
                    }
                ),
                model_used: oracle.model_id().to_string(),
                persona_profile_id: profile.profile_id.clone(),
                persona_display_name: profile.name.clone(),
                input_context,
                output_generated: output,
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
            }
        }
        Err(e) => {
            tracing::warn!(
                target: "ukfw::experts",
                archetype = archetype.as_str(),
                "oracle invocation failed: {}", e
            );
            error_step(
                archetype,
                Some(&profile),
                query,
                &planned.focus,
                format!("Oracle invocation failed: {}", e),
                oracle.model_id().to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::persona::{ResolverError, UkgPersonaResolver};
    use crate::scoring::FixedSampler;
    use async_trait::async_trait;

    struct EchoOracle;

    #[async_trait]
    impl ReasoningOracle for EchoOracle {
        async fn generate(&self, _p: &str, _r: &str) -> Result<String, OracleError> {
            Ok("expert finding".to_string())
        }
        fn model_id(&self) -> &str {
            "stub-model"
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl ReasoningOracle for FailingOracle {
        async fn generate(&self, _p: &str, _r: &str) -> Result<String, OracleError> {
            Err(OracleError::Empty)
        }
        fn model_id(&self) -> &str {
            "stub-model"
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl PersonaResolver for FailingResolver {
        async fn resolve(
            &self,
            _query: &str,
            archetype: ExpertArchetype,
        ) -> Result<crate::persona::PersonaProfile, ResolverError> {
            Err(ResolverError::Unavailable {
                archetype: archetype.as_str().to_string(),
                reason: "graph offline".to_string(),
            })
        }
    }

    fn plan(entries: &[(&str, &str)]) -> ReasoningPlan {
        ReasoningPlan {
            reasoning_sequence: entries
                .iter()
                .map(|(a, f)| PlannedStep {
                    archetype: a.to_string(),
                    focus: f.to_string(),
                })
                .collect(),
            overall_strategy_rationale: "cover all angles".to_string(),
        }
    }

    #[tokio::test]
    async fn planned_order_is_preserved() {
        let plan = plan(&[
            ("RegulatoryExpert", "rules"),
            ("KnowledgeExpert", "theory"),
            ("ComplianceExpert", "controls"),
        ]);
        let mut history = Vec::new();
        let mut errors = Vec::new();
        let steps = run_experts(
            &EchoOracle,
            &UkgPersonaResolver,
            &FixedSampler,
            "q",
            None,
            &plan,
            &mut history,
            &mut errors,
        )
        .await;
        assert_eq!(steps.len(), 3);
        assert!(steps[0].step_id.starts_with("re_"));
        assert!(steps[1].step_id.starts_with("ke_"));
        assert!(steps[2].step_id.starts_with("ce_"));
        assert_eq!(history.len(), 3);
        assert!(errors.is_empty());
        for s in &steps {
            assert_eq!(s.status, StepStatus::Completed);
            let c = s.confidence_score.unwrap();
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[tokio::test]
    async fn unknown_archetype_skipped_without_step() {
        let plan = plan(&[("FinanceExpert", "money"), ("SectorExpert", "industry")]);
        let mut history = Vec::new();
        let mut errors = Vec::new();
        let steps = run_experts(
            &EchoOracle,
            &UkgPersonaResolver,
            &FixedSampler,
            "q",
            None,
            &plan,
            &mut history,
            &mut errors,
        )
        .await;
        assert_eq!(steps.len(), 1);
        assert!(steps[0].step_id.starts_with("se_"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("FinanceExpert"));
    }

    #[tokio::test]
    async fn oracle_failure_becomes_error_step_and_loop_continues() {
        let plan = plan(&[("KnowledgeExpert", "a"), ("ComplianceExpert", "b")]);
        let mut history = Vec::new();
        let mut errors = Vec::new();
        let steps = run_experts(
            &FailingOracle,
            &UkgPersonaResolver,
            &FixedSampler,
            "q",
            None,
            &plan,
            &mut history,
            &mut errors,
        )
        .await;
        assert_eq!(steps.len(), 2);
        for s in &steps {
            assert_eq!(s.status, StepStatus::Error);
            assert!(s.confidence_score.is_none());
            assert_eq!(s.issues_identified, vec![s.output_generated.clone()]);
        }
        assert!(history.is_empty());
        assert_eq!(errors.len(), 2);
    }

    #[tokio::test]
    async fn resolver_failure_becomes_error_step() {
        let plan = plan(&[("RegulatoryExpert", "rules")]);
        let mut history = Vec::new();
        let mut errors = Vec::new();
        let steps = run_experts(
            &EchoOracle,
            &FailingResolver,
            &FixedSampler,
            "q",
            None,
            &plan,
            &mut history,
            &mut errors,
        )
        .await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].status, StepStatus::Error);
        assert_eq!(steps[0].persona_profile_id, "unresolved-re");
        assert!(steps[0].output_generated.contains("graph offline"));
    }

    #[test]
    fn history_entry_formats_confidence() {
        let now = Utc::now();
        let step = ReasoningStep {
            step_id: "ke_1".to_string(),
            description: "d".to_string(),
            model_used: "m".to_string(),
            persona_profile_id: "p1".to_string(),
            persona_display_name: "Dr. K".to_string(),
            input_context: json!({}),
            output_generated: "finding".to_string(),
            confidence_score: Some(0.825),
            knowledge_references: Vec::new(),
            parent_step_id: None,
            child_step_ids: Vec::new(),
            start_time: now,
            end_time: now,
            issues_identified: Vec::new(),
            associated_axes: Vec::new(),
            status: StepStatus::Completed,
            custom_step_data: serde_json::Map::new(),
        };
        assert_eq!(
            history_entry(&step),
            "Summary from Dr. K (p1):\nfinding\nConfidence: 0.82\n"
        );
    }
}
