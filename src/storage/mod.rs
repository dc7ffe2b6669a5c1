//! Storage Layer
//!
//! SQLite persistence for run records and findings, plus the collaborator
//! store interfaces for content items and review profiles. Entity
//! persistence proper stays outside this subsystem; the in-memory
//! implementations here cover embedding and tests.

pub mod database;
pub mod findings;
pub mod runs;

pub use database::{init_schema, open_file_pool, open_memory_pool, DbPool};
pub use findings::{FindingStore, SqliteFindingStore};
pub use runs::{RunStore, SqliteRunStore};

use std::collections::HashMap;
use std::sync::RwLock;

use content_review_core::{ContentItem, ItemRef, ReviewProfile};
use serde::Deserialize;

use crate::utils::error::{AppError, AppResult};

/// Lookup interface for content items.
pub trait ContentStore: Send + Sync {
    /// Load the current revision of an item.
    fn get(&self, item_ref: &ItemRef) -> AppResult<Option<ContentItem>>;
}

/// Lookup interface for review profiles.
pub trait ProfileStore: Send + Sync {
    /// Load a profile by id.
    fn get(&self, profile_id: &str) -> AppResult<Option<ReviewProfile>>;

    /// All known profiles.
    fn list(&self) -> AppResult<Vec<ReviewProfile>>;
}

/// In-memory content store for embedding and tests.
pub struct MemoryContentStore {
    items: RwLock<HashMap<ItemRef, ContentItem>>,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace an item.
    pub fn put(&self, item: ContentItem) {
        if let Ok(mut items) = self.items.write() {
            items.insert(item.item_ref(), item);
        }
    }

    /// Remove an item.
    pub fn remove(&self, item_ref: &ItemRef) {
        if let Ok(mut items) = self.items.write() {
            items.remove(item_ref);
        }
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryContentStore {
    fn get(&self, item_ref: &ItemRef) -> AppResult<Option<ContentItem>> {
        let items = self
            .items
            .read()
            .map_err(|_| AppError::internal("content store lock poisoned"))?;
        Ok(items.get(item_ref).cloned())
    }
}

/// TOML file shape for profile configuration.
#[derive(Debug, Deserialize)]
struct ProfilesFile {
    #[serde(default)]
    profiles: Vec<ReviewProfile>,
}

/// Profile store backed by a fixed, validated profile set.
pub struct StaticProfileStore {
    profiles: HashMap<String, ReviewProfile>,
}

impl StaticProfileStore {
    /// Build a store from profiles, validating each.
    pub fn from_profiles(profiles: Vec<ReviewProfile>) -> AppResult<Self> {
        let mut map = HashMap::new();
        for profile in profiles {
            profile.validate()?;
            if map.insert(profile.id.clone(), profile).is_some() {
                return Err(AppError::validation("duplicate profile id"));
            }
        }
        Ok(Self { profiles: map })
    }

    /// Parse and validate profiles from a TOML document with a top-level
    /// `[[profiles]]` array.
    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        let file: ProfilesFile =
            toml::from_str(raw).map_err(|e| AppError::config(format!("invalid profiles TOML: {}", e)))?;
        Self::from_profiles(file.profiles)
    }
}

impl ProfileStore for StaticProfileStore {
    fn get(&self, profile_id: &str) -> AppResult<Option<ReviewProfile>> {
        Ok(self.profiles.get(profile_id).cloned())
    }

    fn list(&self) -> AppResult<Vec<ReviewProfile>> {
        let mut profiles: Vec<ReviewProfile> = self.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }
}
