//! Expert archetypes and persona profiles.
//!
//! The four expert archetypes are a closed set: the planner may only schedule
//! these, and an archetype name that does not parse into `ExpertArchetype` is
//! skipped by the execution loop. Profiles are resolved per step and embedded
//! in that step's input context; they are never persisted on their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("persona resolution failed for {archetype}: {reason}")]
    Unavailable { archetype: String, reason: String },
}

/// The closed set of expert archetypes the planner can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpertArchetype {
    KnowledgeExpert,
    SectorExpert,
    RegulatoryExpert,
    ComplianceExpert,
}

impl ExpertArchetype {
    pub const ALL: [ExpertArchetype; 4] = [
        ExpertArchetype::KnowledgeExpert,
        ExpertArchetype::SectorExpert,
        ExpertArchetype::RegulatoryExpert,
        ExpertArchetype::ComplianceExpert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertArchetype::KnowledgeExpert => "KnowledgeExpert",
            ExpertArchetype::SectorExpert => "SectorExpert",
            ExpertArchetype::RegulatoryExpert => "RegulatoryExpert",
            ExpertArchetype::ComplianceExpert => "ComplianceExpert",
        }
    }

    /// Parse a planner-emitted archetype name. Unknown names return None and
    /// are skipped by the loop rather than treated as errors.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "KnowledgeExpert" => Some(ExpertArchetype::KnowledgeExpert),
            "SectorExpert" => Some(ExpertArchetype::SectorExpert),
            "RegulatoryExpert" => Some(ExpertArchetype::RegulatoryExpert),
            "ComplianceExpert" => Some(ExpertArchetype::ComplianceExpert),
            _ => None,
        }
    }

    /// Short prefix used in step ids (e.g. `ke_<uuid>`).
    pub fn step_prefix(&self) -> &'static str {
        match self {
            ExpertArchetype::KnowledgeExpert => "ke",
            ExpertArchetype::SectorExpert => "se",
            ExpertArchetype::RegulatoryExpert => "re",
            ExpertArchetype::ComplianceExpert => "ce",
        }
    }

    /// Standing analysis instruction for this archetype, independent of the
    /// planner's per-step focus.
    pub fn analysis_directive(&self) -> &'static str {
        match self {
            ExpertArchetype::KnowledgeExpert => {
                "Analyze the query from first principles and theoretical foundations. \
                 Identify key concepts, core principles, and theoretical underpinnings."
            }
            ExpertArchetype::SectorExpert => {
                "Analyze the query considering its practical application in relevant \
                 industry sectors. Focus on real-world implications, industry best \
                 practices, and sector-specific challenges."
            }
            ExpertArchetype::RegulatoryExpert => {
                "Analyze the query from a regulatory and policy perspective. Focus on \
                 applicable laws, regulations, standards, and policy implications."
            }
            ExpertArchetype::ComplianceExpert => {
                "Analyze the query for compliance requirements, potential risks, and \
                 mitigation strategies. Identify compliance obligations, control gaps, \
                 and adherence concerns."
            }
        }
    }

    /// Confidence range for a completed step from this archetype.
    pub fn confidence_range(&self) -> (f64, f64) {
        match self {
            ExpertArchetype::KnowledgeExpert => (0.70, 0.95),
            ExpertArchetype::SectorExpert => (0.65, 0.90),
            ExpertArchetype::RegulatoryExpert => (0.70, 0.95),
            ExpertArchetype::ComplianceExpert => (0.75, 0.98),
        }
    }
}

/// Structured reference to the source material a persona was instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceReference {
    pub ref_type: String,
    pub id: String,
}

/// Resolved identity and capability descriptor parameterizing one reasoning
/// call. Immutable once resolved for a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub profile_id: String,
    /// Archetype tag; a free string so the planner/synthesizer fixed personas
    /// can carry tags outside the expert set.
    pub persona_archetype: String,
    pub name: String,
    pub job_title: String,
    #[serde(default)]
    pub domain_expertise: Vec<String>,
    #[serde(default)]
    pub key_responsibilities: Vec<String>,
    #[serde(default)]
    pub behavioral_traits: Vec<String>,
    /// Knowledge-graph axis identifiers this persona is associated with.
    #[serde(default)]
    pub ukg_axes: Vec<String>,
    #[serde(default)]
    pub source_references: Vec<SourceReference>,
}

impl PersonaProfile {
    /// Persona header used at the top of every prompt built around this profile.
    pub fn prompt_header(&self) -> String {
        format!(
            "You are {}, a {} ({}).\nYour expertise: {}.\nYour key responsibilities: {}.\nYour behavioral traits: {}.",
            self.name,
            self.persona_archetype,
            self.job_title,
            self.domain_expertise.join(", "),
            self.key_responsibilities.join(", "),
            self.behavioral_traits.join(", "),
        )
    }
}

/// Resolves a persona profile for a query/archetype pair. A failure aborts
/// only the step that requested it.
#[async_trait]
pub trait PersonaResolver: Send + Sync {
    async fn resolve(
        &self,
        query: &str,
        archetype: ExpertArchetype,
    ) -> Result<PersonaProfile, ResolverError>;

    /// Fixed profile for the planning stage (no query dependence).
    fn planner_profile(&self) -> PersonaProfile {
        planner_profile()
    }

    /// Fixed profile for the synthesis stage (no query dependence).
    fn synthesizer_profile(&self) -> PersonaProfile {
        synthesizer_profile()
    }
}

/// Default resolver: builds an archetype-specific profile from static UKG
/// axis associations. A real deployment would query the knowledge graph; the
/// profile shape is the contract, not the lookup.
pub struct UkgPersonaResolver;

#[async_trait]
impl PersonaResolver for UkgPersonaResolver {
    async fn resolve(
        &self,
        query: &str,
        archetype: ExpertArchetype,
    ) -> Result<PersonaProfile, ResolverError> {
        tracing::debug!(
            target: "ukfw::persona",
            archetype = archetype.as_str(),
            "resolving persona profile"
        );
        let (name, job_title, axes, expertise) = match archetype {
            ExpertArchetype::KnowledgeExpert => (
                "Dr. Dynamic Knowledge",
                "Principal Theoretical Researcher",
                vec!["AXIS_THEORY", "AXIS_FUNDAMENTALS"],
                vec!["Foundational Analysis", "Theoretical Modelling"],
            ),
            ExpertArchetype::SectorExpert => (
                "Ms. Dynamic Sector Lead",
                "Senior Industry Consultant",
                vec!["AXIS_INDUSTRY_APP", "AXIS_PRACTICE"],
                vec!["Sector Operations", "Industry Practice"],
            ),
            ExpertArchetype::RegulatoryExpert => (
                "Mr. Dynamic Regulator",
                "Chief Policy Advisor",
                vec!["AXIS_REGULATION", "AXIS_POLICY"],
                vec!["Regulatory Law", "Policy Analysis"],
            ),
            ExpertArchetype::ComplianceExpert => (
                "Mrs. Dynamic Compliance",
                "Head of Standards Assurance",
                vec!["AXIS_COMPLIANCE", "AXIS_STANDARDS"],
                vec!["Compliance Auditing", "Risk Management"],
            ),
        };
        let excerpt: String = query.chars().take(30).collect();
        Ok(PersonaProfile {
            profile_id: format!("dyn-{}-{}", archetype.step_prefix(), uuid::Uuid::new_v4()),
            persona_archetype: archetype.as_str().to_string(),
            name: name.to_string(),
            job_title: job_title.to_string(),
            domain_expertise: expertise.into_iter().map(String::from).collect(),
            key_responsibilities: vec![format!(
                "{} scoped to the current query",
                archetype.as_str()
            )],
            behavioral_traits: vec!["analytical".to_string(), "meticulous".to_string()],
            ukg_axes: axes.into_iter().map(String::from).collect(),
            source_references: vec![SourceReference {
                ref_type: "ukg_node".to_string(),
                id: format!("ukg_node_{}_{}", archetype.step_prefix(), excerpt.len()),
            }],
        })
    }
}

/// Fixed planner persona ("Orchestrator Prime").
pub fn planner_profile() -> PersonaProfile {
    PersonaProfile {
        profile_id: "static-planner-001".to_string(),
        persona_archetype: "PlannerExpert".to_string(),
        name: "Orchestrator Prime".to_string(),
        job_title: "Chief Strategy & Reasoning Officer".to_string(),
        domain_expertise: vec![
            "Query Analysis".to_string(),
            "Problem Decomposition".to_string(),
            "Multi-Agent Coordination".to_string(),
        ],
        key_responsibilities: vec![
            "Decompose the query into expert sub-tasks".to_string(),
            "Sequence expert personas with a focus per step".to_string(),
        ],
        behavioral_traits: vec!["strategic".to_string(), "decisive".to_string()],
        ukg_axes: vec![
            "AXIS_STRATEGY_PLANNING".to_string(),
            "AXIS_REASONING_ORCHESTRATION".to_string(),
        ],
        source_references: vec![SourceReference {
            ref_type: "internal_model_config".to_string(),
            id: "planner_persona_v1".to_string(),
        }],
    }
}

/// Fixed synthesizer persona ("Consolidator Unit").
pub fn synthesizer_profile() -> PersonaProfile {
    PersonaProfile {
        profile_id: "static-synthesizer-001".to_string(),
        persona_archetype: "SynthesizerExpert".to_string(),
        name: "Consolidator Unit".to_string(),
        job_title: "Chief Integration Officer".to_string(),
        domain_expertise: vec![
            "Information Synthesis".to_string(),
            "Multi-perspective Analysis".to_string(),
        ],
        key_responsibilities: vec![
            "Consolidate expert findings into one coherent answer".to_string(),
            "Surface unresolved disagreement or uncertainty".to_string(),
        ],
        behavioral_traits: vec!["integrative".to_string(), "concise".to_string()],
        ukg_axes: vec!["AXIS_SYNTHESIS".to_string(), "AXIS_INTEGRATION".to_string()],
        source_references: vec![SourceReference {
            ref_type: "internal_model_config".to_string(),
            id: "synthesizer_persona_v1".to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archetype_parse_round_trip() {
        for a in ExpertArchetype::ALL {
            assert_eq!(ExpertArchetype::from_str(a.as_str()), Some(a));
        }
        assert_eq!(ExpertArchetype::from_str("FinanceExpert"), None);
        assert_eq!(ExpertArchetype::from_str(" RegulatoryExpert "), Some(ExpertArchetype::RegulatoryExpert));
    }

    #[test]
    fn confidence_ranges_inside_unit_interval() {
        for a in ExpertArchetype::ALL {
            let (lo, hi) = a.confidence_range();
            assert!(0.0 <= lo && lo < hi && hi <= 1.0);
        }
    }

    #[tokio::test]
    async fn dynamic_resolver_matches_archetype() {
        let resolver = UkgPersonaResolver;
        let profile = resolver
            .resolve("drone rules", ExpertArchetype::ComplianceExpert)
            .await
            .unwrap();
        assert_eq!(profile.persona_archetype, "ComplianceExpert");
        assert!(profile.profile_id.starts_with("dyn-ce-"));
        assert!(!profile.ukg_axes.is_empty());
    }

    #[test]
    fn fixed_profiles_have_stable_ids() {
        assert_eq!(planner_profile().profile_id, "static-planner-001");
        assert_eq!(synthesizer_profile().profile_id, "static-synthesizer-001");
    }
}
