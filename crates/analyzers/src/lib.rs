//! Content Review Analyzers
//!
//! The analyzer registry and the built-in quality-review analyzers. Each
//! analyzer builds a prompt from the analysis context and parses the model's
//! JSON response into reported findings; execution and retry live in the
//! application crate's orchestrator.
//!
//! ## Architecture
//!
//! - `Analyzer` trait (from `content-review-core`): prompt + parse interface
//! - `ClarityAnalyzer`: readability problems
//! - `PolicyComplianceAnalyzer`: editorial-policy violations
//! - `AnalyzerRegistry`: manages analyzers with enable/disable support

pub mod clarity;
pub mod compliance;
pub mod parse;
pub mod registry;

// Re-export key types
pub use clarity::ClarityAnalyzer;
pub use compliance::PolicyComplianceAnalyzer;
pub use parse::extract_findings;
pub use registry::{AnalyzerInfo, AnalyzerRegistry};
