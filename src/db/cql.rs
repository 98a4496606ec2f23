use super::CollectionBackend;
use crate::error::CollectionError;
use crate::models::{CollectionKind, Entry, UserCollection, UserId};
use async_trait::async_trait;
use log::{debug, info};
use scylla::{query::Query, Session, SessionBuilder};
use std::collections::HashMap;

/// Collections stored in ScyllaDB, one row per owner and kind with the
/// item map JSON-encoded in `entries`.
pub struct ScyllaBackend {
    session: Session,
    select_cql: String,
    upsert_cql: String,
}

fn unavailable(e: impl std::fmt::Display) -> CollectionError {
    CollectionError::StoreUnavailable(e.to_string())
}

impl ScyllaBackend {
    pub async fn connect(nodes: &[String], keyspace: &str) -> Result<Self, CollectionError> {
        let mut builder = SessionBuilder::new();
        for node in nodes {
            builder = builder.known_node(node);
        }
        let session = builder.build().await.map_err(unavailable)?;

        session
            .query(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    keyspace
                ),
                &[],
            )
            .await
            .map_err(unavailable)?;
        session
            .query(
                format!(
                    "CREATE TABLE IF NOT EXISTS {}.collections (owner TEXT, kind TEXT, entries TEXT, PRIMARY KEY (owner, kind))",
                    keyspace
                ),
                &[],
            )
            .await
            .map_err(unavailable)?;

        info!("Connected to ScyllaDB keyspace {}.", keyspace);
        Ok(ScyllaBackend {
            session,
            select_cql: format!(
                "SELECT entries FROM {}.collections WHERE owner = ? AND kind = ?",
                keyspace
            ),
            upsert_cql: format!(
                "INSERT INTO {}.collections (owner, kind, entries) VALUES (?, ?, ?)",
                keyspace
            ),
        })
    }
}

#[async_trait]
impl CollectionBackend for ScyllaBackend {
    async fn load(
        &self,
        owner: &UserId,
        kind: CollectionKind,
    ) -> Result<Option<UserCollection>, CollectionError> {
        let query = Query::new(self.select_cql.clone());
        let result = self
            .session
            .query(query, (owner.as_str(), kind.as_str()))
            .await
            .map_err(unavailable)?;

        let row = match result.rows.and_then(|rows| rows.into_iter().next()) {
            Some(row) => row,
            None => return Ok(None),
        };
        let document = row
            .columns
            .first()
            .and_then(|column| column.as_ref())
            .and_then(|value| value.as_text())
            .ok_or_else(|| {
                CollectionError::StoreUnavailable(format!(
                    "{} document for {} has no entries column",
                    kind, owner
                ))
            })?;

        debug!("Loaded {} document for {}", kind, owner);
        Ok(Some(UserCollection {
            owner: owner.clone(),
            kind,
            entries: decode_entries(document)?,
        }))
    }

    async fn save(&self, collection: &UserCollection) -> Result<(), CollectionError> {
        let document = encode_entries(&collection.entries)?;
        let query = Query::new(self.upsert_cql.clone());
        self.session
            .query(
                query,
                (
                    collection.owner.as_str(),
                    collection.kind.as_str(),
                    document,
                ),
            )
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

pub fn encode_entries(entries: &HashMap<String, Entry>) -> Result<String, CollectionError> {
    Ok(serde_json::to_string(entries)?)
}

pub fn decode_entries(document: &str) -> Result<HashMap<String, Entry>, CollectionError> {
    if document.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetType;
    use chrono::{TimeZone, Utc};

    #[test]
    fn document_keeps_optional_fields() {
        let mut entries = HashMap::new();
        entries.insert(
            "eth".to_string(),
            Entry {
                symbol: "ETH".to_string(),
                name: "Ethereum".to_string(),
                asset_type: AssetType::Crypto,
                notes: Some("watch the merge".to_string()),
                target_price: Some(3000.0),
                added_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        );

        let document = encode_entries(&entries).unwrap();
        assert_eq!(decode_entries(&document).unwrap(), entries);
    }

    #[test]
    fn blank_document_is_an_empty_collection() {
        assert!(decode_entries("").unwrap().is_empty());
        assert!(decode_entries("{}").unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_is_store_unavailable() {
        assert!(matches!(
            decode_entries("{\"eth\": 42}"),
            Err(CollectionError::StoreUnavailable(_))
        ));
    }
}
