//! Planner Stage: decompose the query into an ordered expert sequence.
//!
//! The oracle is asked for a strict-JSON plan. A malformed reply is NOT fatal:
//! the plan degrades to an empty sequence and the pipeline continues straight
//! to synthesis. Only a thrown stage error (oracle unreachable) short-circuits
//! synthesis, via the sentinel rationale set by the pipeline.

use crate::oracle::{OracleError, ReasoningOracle};
use crate::persona::PersonaProfile;
use crate::provision::Provision;
use crate::scoring::ConfidenceSampler;
use crate::trace::{ReasoningStep, StepStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Rationale set when the planner stage itself threw. Checked verbatim before
/// synthesis; never produced by a (successfully parsed or degraded) plan.
pub const PLANNER_FAILED_SENTINEL: &str = "PLANNER_STAGE_FAILED";

/// Rationale of the degraded plan after a parse failure.
pub const PARSE_FAILURE_RATIONALE: &str = "Planner failed to generate a valid plan.";

const PROVISION_EXCERPT_MAX: usize = 1000;
const PLANNER_CONFIDENCE_RANGE: (f64, f64) = (0.80, 0.98);
const PARSE_FAILURE_CONFIDENCE: f64 = 0.30;

/// One planned entry: which archetype, with what focus. The archetype stays a
/// string here (the oracle emits text); the execution loop validates it
/// against the closed `ExpertArchetype` set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedStep {
    pub archetype: String,
    #[serde(default)]
    pub focus: String,
}

/// The planner's transient output; embedded in its step, never persisted alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningPlan {
    pub reasoning_sequence: Vec<PlannedStep>,
    #[serde(default)]
    pub overall_strategy_rationale: String,
}

impl ReasoningPlan {
    /// Degraded plan after a parse failure: empty sequence, fixed rationale.
    pub fn degraded() -> Self {
        Self {
            reasoning_sequence: Vec::new(),
            overall_strategy_rationale: PARSE_FAILURE_RATIONALE.to_string(),
        }
    }

    /// Sentinel plan set by the pipeline when the planner stage threw.
    pub fn failed_sentinel() -> Self {
        Self {
            reasoning_sequence: Vec::new(),
            overall_strategy_rationale: PLANNER_FAILED_SENTINEL.to_string(),
        }
    }

    pub fn is_failed_sentinel(&self) -> bool {
        self.overall_strategy_rationale == PLANNER_FAILED_SENTINEL
    }
}

fn provision_block(provision: &Provision) -> String {
    let mut lines = vec![
        "\nYou are also provided with specific context for a regulatory provision. \
         PRIORITIZE this provision in your analysis and planning:"
            .to_string(),
        format!("Provision ID: {}", provision.id),
        format!("Provision Title: \"{}\"", provision.title),
    ];
    let excerpt: String = if provision.text.chars().count() > PROVISION_EXCERPT_MAX {
        let head: String = provision.text.chars().take(PROVISION_EXCERPT_MAX).collect();
        format!("{}...", head)
    } else {
        provision.text.clone()
    };
    lines.push(format!("Provision Text: \"\"\"\n{}\n\"\"\"", excerpt));
    if let Some(section) = provision.section.as_deref() {
        lines.push(format!("Section: {}", section));
    }
    if !provision.tags.is_empty() {
        lines.push(format!("Tags: {}", provision.tags.join(", ")));
    }
    if !provision.roles_responsible.is_empty() {
        lines.push(format!(
            "Responsible Role IDs: {}",
            provision.roles_responsible.join(", ")
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn planning_instructions(
    profile: &PersonaProfile,
    query: &str,
    provision: Option<&Provision>,
) -> String {
    let provision_details = provision.map(provision_block).unwrap_or_default();
    let provision_clause = if provision.is_some() {
        "AND the detailed provision context provided above, "
    } else {
        ""
    };
    format!(
        r#"{header}
Your goal is to analyze the user's query and create a strategic reasoning plan.

The user's query is: "{query}"
{provision_details}
Based on this query {provision_clause}determine the optimal sequence of the following expert persona archetypes to involve:
KnowledgeExpert, SectorExpert, RegulatoryExpert, ComplianceExpert.
You may choose to use all, some, or none, and in any order you deem best.
For each chosen persona, briefly specify a 'focus' or sub-task for them related to the main query (and the specific provision if provided).

Output your plan STRICTLY as a JSON object with the following structure:
{{
  "reasoning_sequence": [
    {{ "archetype": "<Archetype_Name>", "focus": "<Specific focus or sub-task for this archetype>" }}
  ],
  "overall_strategy_rationale": "<Brief rationale for your chosen sequence and focus areas.>"
}}

Example for a query about 'new drone regulations for agriculture' (without specific provision context):
{{
  "reasoning_sequence": [
    {{ "archetype": "KnowledgeExpert", "focus": "Define key terms: drone, agriculture, current regulatory landscape overview." }},
    {{ "archetype": "RegulatoryExpert", "focus": "Detail the new drone regulations specifically for agriculture, citing relevant sections." }},
    {{ "archetype": "SectorExpert", "focus": "Analyze the practical impact of these new regulations on agricultural operations and drone usage." }},
    {{ "archetype": "ComplianceExpert", "focus": "Outline compliance steps and potential challenges for agricultural businesses regarding these new drone regulations." }}
  ],
  "overall_strategy_rationale": "Sequential approach: define terms, detail regulations, analyze impact, then outline compliance."
}}

If specific provision context IS provided, your plan and rationale MUST heavily focus on that provision.
Ensure the output is ONLY the JSON object, with no other text before or after."#,
        header = profile.prompt_header(),
        query = query,
        provision_details = provision_details,
        provision_clause = provision_clause,
    )
}

/// Parse the raw oracle output into a plan. `Err` carries a human-readable
/// detail; it means "degrade", not "abort".
fn parse_plan(raw: &str) -> Result<ReasoningPlan, String> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| format!("Failed to parse planner output as JSON: {}. Raw output: {}", e, raw))?;
    let valid_shape = value
        .as_object()
        .map(|o| o.get("reasoning_sequence").map(Value::is_array) == Some(true))
        .unwrap_or(false);
    if !valid_shape {
        return Err(format!(
            "Planner output JSON structure invalid: expected a mapping with a 'reasoning_sequence' list. Raw output: {}",
            raw
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| format!("Planner output JSON structure invalid: {}. Raw output: {}", e, raw))
}

/// Run the planner stage. Returns the planner's reasoning step and the plan
/// (possibly degraded). A returned `Err` means the stage itself threw; the
/// pipeline converts that into a synthetic error step plus the sentinel plan.
pub async fn run_planner(
    oracle: &dyn ReasoningOracle,
    sampler: &dyn ConfidenceSampler,
    profile: &PersonaProfile,
    query: &str,
    provision: Option<&Provision>,
) -> Result<(ReasoningStep, ReasoningPlan), OracleError> {
    let start_time = Utc::now();
    let instructions = planning_instructions(profile, query, provision);
    let user_prompt = match provision {
        Some(p) => format!("{}\n(Context: Provision '{}')", query, p.title),
        None => query.to_string(),
    };

    tracing::info!(
        target: "ukfw::planner",
        provision = provision.map(|p| p.id.as_str()).unwrap_or("none"),
        "planner stage invoking oracle"
    );
    let raw = oracle.generate(&user_prompt, &instructions).await?;
    let end_time = Utc::now();

    let mut input_context = json!({
        "query": query,
        "persona_config": profile,
    });
    if let Some(p) = provision {
        input_context["provision_id"] = json!(p.id);
        input_context["provision_context"] = json!(p);
    }

    let mut custom = serde_json::Map::new();
    let (plan, status, confidence, issues) = match parse_plan(&raw) {
        Ok(plan) => {
            custom.insert("parsed_plan".to_string(), json!(plan));
            let (lo, hi) = PLANNER_CONFIDENCE_RANGE;
            (plan, StepStatus::Completed, sampler.sample(lo, hi), Vec::new())
        }
        Err(detail) => {
            tracing::warn!(target: "ukfw::planner", "plan parse failed: {}", detail);
            custom.insert("parsing_error_detail".to_string(), json!(detail));
            (
                ReasoningPlan::degraded(),
                StepStatus::ErrorParsingPlan,
                PARSE_FAILURE_CONFIDENCE,
                vec![detail],
            )
        }
    };

    let description = match provision {
        Some(p) => format!(
            "{} ({}) generating a strategic reasoning plan for provision {}.",
            profile.name, profile.persona_archetype, p.id
        ),
        None => format!(
            "{} ({}) generating a strategic reasoning plan.",
            profile.name, profile.persona_archetype
        ),
    };

    let step = ReasoningStep {
        step_id: format!("planner_{}", uuid::Uuid::new_v4()),
        description,
        model_used: oracle.model_id().to_string(),
        persona_profile_id: profile.profile_id.clone(),
        persona_display_name: profile.name.clone(),
        input_context,
        output_generated: raw,
        confidence_score: Some(confidence),
        knowledge_references: profile.source_references.clone(),
        parent_step_id: None,
        child_step_ids: Vec::new(),
        start_time,
        end_time,
        issues_identified: issues,
        associated_axes: profile.ukg_axes.clone(),
        status,
        custom_step_data: custom,
    };

    Ok((step, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::planner_profile;
    use crate::scoring::FixedSampler;
    use async_trait::async_trait;

    struct CannedOracle(String);

    #[async_trait]
    impl ReasoningOracle for CannedOracle {
        async fn generate(&self, _prompt: &str, _role: &str) -> Result<String, OracleError> {
            Ok(self.0.clone())
        }
        fn model_id(&self) -> &str {
            "stub-model"
        }
    }

    fn valid_plan_json() -> String {
        serde_json::json!({
            "reasoning_sequence": [
                {"archetype": "RegulatoryExpert", "focus": "detail the rule"},
                {"archetype": "ComplianceExpert", "focus": "compliance steps"}
            ],
            "overall_strategy_rationale": "regulation first, then compliance"
        })
        .to_string()
    }

    #[tokio::test]
    async fn valid_json_yields_completed_step_and_plan() {
        let oracle = CannedOracle(valid_plan_json());
        let profile = planner_profile();
        let (step, plan) = run_planner(&oracle, &FixedSampler, &profile, "q", None)
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(plan.reasoning_sequence.len(), 2);
        assert_eq!(plan.reasoning_sequence[0].archetype, "RegulatoryExpert");
        assert!(step.custom_step_data.contains_key("parsed_plan"));
        let c = step.confidence_score.unwrap();
        assert!((0.80..=0.98).contains(&c));
    }

    #[tokio::test]
    async fn malformed_json_degrades_plan() {
        let oracle = CannedOracle("Here is your plan: do things".to_string());
        let profile = planner_profile();
        let (step, plan) = run_planner(&oracle, &FixedSampler, &profile, "q", None)
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::ErrorParsingPlan);
        assert_eq!(step.confidence_score, Some(0.30));
        assert!(plan.reasoning_sequence.is_empty());
        assert_eq!(plan.overall_strategy_rationale, PARSE_FAILURE_RATIONALE);
        assert!(!plan.is_failed_sentinel());
        assert!(step.custom_step_data.contains_key("parsing_error_detail"));
    }

    #[tokio::test]
    async fn json_without_sequence_list_degrades_plan() {
        let oracle = CannedOracle(r#"{"overall_strategy_rationale": "no steps"}"#.to_string());
        let profile = planner_profile();
        let (step, plan) = run_planner(&oracle, &FixedSampler, &profile, "q", None)
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::ErrorParsingPlan);
        assert!(plan.reasoning_sequence.is_empty());
    }

    #[tokio::test]
    async fn provision_context_lands_in_step_input() {
        let oracle = CannedOracle(valid_plan_json());
        let profile = planner_profile();
        let provision = Provision {
            id: "PROV-001".to_string(),
            title: "Data Retention Requirement".to_string(),
            text: "x".repeat(1500),
            section: None,
            jurisdiction: None,
            tags: Vec::new(),
            roles_responsible: Vec::new(),
        };
        let (step, _) = run_planner(&oracle, &FixedSampler, &profile, "q", Some(&provision))
            .await
            .unwrap();
        assert_eq!(step.input_context["provision_id"], "PROV-001");
        assert!(step.description.contains("PROV-001"));
    }

    #[test]
    fn excerpt_is_bounded() {
        let provision = Provision {
            id: "P".to_string(),
            title: "T".to_string(),
            text: "y".repeat(5000),
            section: None,
            jurisdiction: None,
            tags: Vec::new(),
            roles_responsible: Vec::new(),
        };
        let block = provision_block(&provision);
        assert!(block.contains(&format!("{}...", "y".repeat(1000))));
        assert!(!block.contains(&"y".repeat(1001)));
    }

    #[test]
    fn sentinel_plan_is_detected_verbatim() {
        assert!(ReasoningPlan::failed_sentinel().is_failed_sentinel());
        assert!(!ReasoningPlan::degraded().is_failed_sentinel());
    }
}
