//! Analysis Context
//!
//! The context a context builder assembles for analyzers: combined analyzable
//! text, per-field fragments, selected metadata, and optional policy text.
//! The builder also owns the content fingerprint used for staleness and
//! cache decisions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::ContentItem;
use crate::error::CoreResult;
use crate::profile::ReviewProfile;

/// One analyzable text fragment, tagged with its source field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFragment {
    /// Field the fragment came from
    pub source_field: String,
    /// Fragment text
    pub text: String,
}

/// The assembled analysis input for one (item, profile) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    /// Selected item metadata
    pub meta: BTreeMap<String, String>,
    /// Per-field fragments in field order
    pub fragments: Vec<ContextFragment>,
    /// All fragments joined into one analyzable document
    pub combined_text: String,
    /// Editorial policy text, when the profile or site carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_text: Option<String>,
}

/// Builds analysis context and content fingerprints.
///
/// Implementations must be deterministic: identical item + profile inputs
/// must produce identical context and identical fingerprints. Fingerprints
/// are opaque hex strings compared only for equality, never parsed.
#[async_trait]
pub trait ContextBuilder: Send + Sync {
    /// Assemble the analysis context for an item under a profile.
    async fn build_context(
        &self,
        item: &ContentItem,
        profile: &ReviewProfile,
    ) -> CoreResult<AnalysisContext>;

    /// Compute the content fingerprint for an item under a profile.
    ///
    /// Covers the normalized analyzable text, selected metadata, the profile
    /// id, and the enabled analyzer list, so that changing any of them
    /// invalidates cached runs.
    fn compute_fingerprint(&self, item: &ContentItem, profile: &ReviewProfile) -> String;
}
