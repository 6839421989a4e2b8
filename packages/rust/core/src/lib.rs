//! Core pipeline orchestration for ProfitGraph.
//!
//! This crate ties ingestion, the agent pass, graph sync, and artifact
//! generation into end-to-end workflows (`run_pipeline`, `refine_graph`,
//! the oracle, the planner, and the dashboard export).

pub mod dashboard;
pub mod marker;
pub mod oracle;
pub mod pipeline;
pub mod planner;
pub mod refine;
