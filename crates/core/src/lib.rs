//! Content Review Core
//!
//! Foundational traits, error types, and analysis-context types for the
//! Content Review workspace. This crate has zero dependencies on
//! application-level code (storage, LLM providers, queues).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `severity` - The ordered finding severity scale
//! - `finding` - Finding payloads analyzers emit (`ReportedFinding`, `Evidence`)
//! - `content` - Content items under review (`ContentItem`, `ItemRef`)
//! - `context` - Analysis context + builder trait (`AnalysisContext`, `ContextBuilder`)
//! - `analyzer` - The pluggable check trait (`Analyzer`, `AnalyzerPrompt`)
//! - `profile` - Typed review-profile configuration (`ReviewProfile`)
//!
//! ## Design Principles
//!
//! 1. **Zero external dependencies beyond serde/async-trait/thiserror** - keeps build times minimal
//! 2. **Trait-based abstractions** - enables mocking, testing, and future crate splitting
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod analyzer;
pub mod content;
pub mod context;
pub mod error;
pub mod finding;
pub mod profile;
pub mod severity;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Severity Scale ─────────────────────────────────────────────────────
pub use severity::Severity;

// ── Finding Payloads ───────────────────────────────────────────────────
pub use finding::{Evidence, ReportedFinding};

// ── Content Items ──────────────────────────────────────────────────────
pub use content::{ContentItem, ItemRef};

// ── Analysis Context ───────────────────────────────────────────────────
pub use context::{AnalysisContext, ContextBuilder, ContextFragment};

// ── Analyzer Trait ─────────────────────────────────────────────────────
pub use analyzer::{Analyzer, AnalyzerPrompt};

// ── Profiles ───────────────────────────────────────────────────────────
pub use profile::{AiSettings, ExecutionSettings, GatingSettings, ReviewProfile, RunMode};
