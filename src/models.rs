use crate::error::CollectionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Wishlist,
    Saved,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Wishlist => "wishlist",
            CollectionKind::Saved => "saved",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wishlist" => Ok(CollectionKind::Wishlist),
            "saved" => Ok(CollectionKind::Saved),
            other => Err(CollectionError::InvalidInput(format!(
                "unknown collection kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Crypto,
    Stock,
}

impl FromStr for AssetType {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crypto" => Ok(AssetType::Crypto),
            "stock" => Ok(AssetType::Stock),
            "" => Err(CollectionError::InvalidInput(
                "assetType is required".to_string(),
            )),
            other => Err(CollectionError::InvalidInput(format!(
                "unknown assetType '{}'",
                other
            ))),
        }
    }
}

/// Resolved identity of the caller. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, CollectionError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CollectionError::InvalidInput(
                "owner must not be empty".to_string(),
            ));
        }
        Ok(UserId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields submitted with an add request. Missing strings deserialize as
/// empty and are rejected by the store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFields {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub asset_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub target_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    pub added_at: DateTime<Utc>,
}

/// An entry as returned to callers, with its key promoted to `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub entry: Entry,
}

/// One user's wishlist or saved items, persisted as a single document.
#[derive(Debug, Clone)]
pub struct UserCollection {
    pub owner: UserId,
    pub kind: CollectionKind,
    pub entries: HashMap<String, Entry>,
}

impl UserCollection {
    pub fn empty(owner: UserId, kind: CollectionKind) -> Self {
        UserCollection {
            owner,
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    /// Inserts unless the id is already present. Existing entries are never
    /// touched.
    pub fn insert_if_absent(&mut self, item_id: &str, entry: Entry) -> bool {
        if self.contains(item_id) {
            return false;
        }
        self.entries.insert(item_id.to_string(), entry);
        true
    }

    pub fn remove(&mut self, item_id: &str) -> bool {
        self.entries.remove(item_id).is_some()
    }

    /// Entries ordered by `added_at`, ties broken by id.
    pub fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self
            .entries
            .iter()
            .map(|(id, entry)| Item {
                id: id.clone(),
                entry: entry.clone(),
            })
            .collect();
        items.sort_by(|a, b| {
            a.entry
                .added_at
                .cmp(&b.entry.added_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }
}
