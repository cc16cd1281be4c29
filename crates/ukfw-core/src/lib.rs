//! ukfw-core: dynamic multi-persona reasoning for regulatory queries.
//!
//! One inbound query is planned into an ordered sequence of expert personas,
//! each backed by a Reasoning Oracle call; a synthesizer consolidates their
//! findings and the whole run is recorded as an auditable `ReasoningTrace`.
//! The gateway crate wires the HTTP surface around `ReasoningPipeline`.

mod config;
mod oracle;
mod persona;
pub mod pipeline;
mod provision;
mod scoring;
mod trace;
mod trace_store;

pub use config::{OracleConfig, ReasonerConfig};
pub use oracle::{OracleBridge, OracleError, ReasoningOracle};
pub use persona::{
    planner_profile, synthesizer_profile, ExpertArchetype, PersonaProfile, PersonaResolver,
    ResolverError, SourceReference, UkgPersonaResolver,
};
pub use pipeline::planner::{
    PlannedStep, ReasoningPlan, PARSE_FAILURE_RATIONALE, PLANNER_FAILED_SENTINEL,
};
pub use pipeline::synthesizer::SYNTHESIS_FALLBACK_SUMMARY;
pub use pipeline::ReasoningPipeline;
pub use provision::{CatalogError, Provision, ProvisionCatalog, ProvisionLookup};
pub use scoring::{ConfidenceSampler, FixedSampler, RandomSampler};
pub use trace::{aggregate_confidence, QueryContext, ReasoningStep, ReasoningTrace, StepStatus};
pub use trace_store::{TraceStore, TraceStoreError};
