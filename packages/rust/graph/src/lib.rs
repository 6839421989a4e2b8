//! Neo4j client for the ProfitGraph knowledge graph.
//!
//! This crate is the single mutation point for the knowledge graph. All
//! graph reads and writes flow through [`GraphClient`], which speaks the
//! Neo4j HTTP transaction API so the whole workspace shares one HTTP stack.

pub mod client;
pub mod mutations;
pub mod queries;

pub use client::{GraphClient, Statement, StatementResult};
pub use queries::{SnapshotEdge, SnapshotNode, StrategyRow};
