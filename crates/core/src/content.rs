//! Content Items
//!
//! The unit of reviewable content. Field maps use `BTreeMap` so that
//! iteration order is deterministic, which the fingerprint builder relies on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identity of a content item, independent of any loaded revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    /// Content type identifier (e.g. "article", "landing_page")
    pub item_type: String,
    /// Stable item identifier
    pub item_id: String,
}

impl ItemRef {
    /// Create an item reference.
    pub fn new(item_type: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: item_id.into(),
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.item_type, self.item_id)
    }
}

/// A loaded content item revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Content type identifier
    pub item_type: String,
    /// Stable item identifier
    pub item_id: String,
    /// Revision identifier of this loaded snapshot
    pub revision_id: String,
    /// Display title
    pub title: String,
    /// Analyzable body fields, keyed by field name
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Selected metadata included in context and fingerprint
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl ContentItem {
    /// Create an item with a title and no body fields.
    pub fn new(
        item_type: impl Into<String>,
        item_id: impl Into<String>,
        revision_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: item_id.into(),
            revision_id: revision_id.into(),
            title: title.into(),
            fields: BTreeMap::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Add a body field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(name.into(), value.into());
        self
    }

    /// The item's reference (type + id).
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.item_type.clone(), self.item_id.clone())
    }
}
