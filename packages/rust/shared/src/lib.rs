//! Shared types, error model, and configuration for ProfitGraph.
//!
//! This crate is the foundation depended on by all other ProfitGraph crates.
//! It provides:
//! - [`ProfitGraphError`], the unified error type
//! - Domain types ([`VideoId`], [`TranscriptDoc`], [`Entity`], [`Relationship`])
//! - Configuration ([`AppConfig`], [`GraphCredentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GeminiConfig, GraphConfig, GraphCredentials, SonarConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_api_keys,
};
pub use error::{ProfitGraphError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, Entity, MarketingCopy, RelKind, Relationship, ResearchPlan,
    StrategyBrief, TranscriptDoc, VideoId,
};
