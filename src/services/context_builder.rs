//! Default Context Builder
//!
//! Assembles analysis context from an item's fields and computes the
//! SHA-256 content fingerprint over the normalized analyzable text, selected
//! metadata, the profile id, and the enabled analyzer list. Identical inputs
//! always produce identical output; the fingerprint is an opaque hex string
//! compared only for equality.

use std::fmt::Write as _;

use async_trait::async_trait;
use content_review_core::{
    AnalysisContext, ContentItem, ContextBuilder, ContextFragment, CoreResult, ReviewProfile,
};
use sha2::{Digest, Sha256};

/// SHA-256-fingerprinting context builder over item fields.
pub struct FieldContextBuilder {
    /// Site-wide editorial policy text passed through to analyzers
    policy_text: Option<String>,
}

impl FieldContextBuilder {
    /// Create a builder without policy text.
    pub fn new() -> Self {
        Self { policy_text: None }
    }

    /// Attach site-wide policy text.
    pub fn with_policy_text(mut self, policy: impl Into<String>) -> Self {
        self.policy_text = Some(policy.into());
        self
    }
}

impl Default for FieldContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse whitespace runs and trim, so cosmetic edits don't change the
/// fingerprint.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn combined_text(item: &ContentItem) -> String {
    let mut parts = vec![item.title.clone()];
    for value in item.fields.values() {
        parts.push(value.clone());
    }
    parts.join("\n\n")
}

#[async_trait]
impl ContextBuilder for FieldContextBuilder {
    async fn build_context(
        &self,
        item: &ContentItem,
        _profile: &ReviewProfile,
    ) -> CoreResult<AnalysisContext> {
        let mut fragments = vec![ContextFragment {
            source_field: "title".to_string(),
            text: item.title.clone(),
        }];
        for (field, value) in &item.fields {
            fragments.push(ContextFragment {
                source_field: field.clone(),
                text: value.clone(),
            });
        }

        Ok(AnalysisContext {
            meta: item.meta.clone(),
            fragments,
            combined_text: combined_text(item),
            policy_text: self.policy_text.clone(),
        })
    }

    fn compute_fingerprint(&self, item: &ContentItem, profile: &ReviewProfile) -> String {
        let mut hasher = Sha256::new();
        hasher.update(item.item_type.as_bytes());
        hasher.update([0]);
        hasher.update(item.item_id.as_bytes());
        hasher.update([0]);
        hasher.update(normalize(&combined_text(item)).as_bytes());
        hasher.update([0]);
        for (key, value) in &item.meta {
            hasher.update(key.as_bytes());
            hasher.update([0]);
            hasher.update(value.as_bytes());
            hasher.update([0]);
        }
        hasher.update(profile.id.as_bytes());
        hasher.update([0]);
        for analyzer_id in &profile.enabled_analyzers {
            hasher.update(analyzer_id.as_bytes());
            hasher.update([0]);
        }

        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }
}
