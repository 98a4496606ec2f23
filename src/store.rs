use crate::db::CollectionBackend;
use crate::error::CollectionError;
use crate::models::{AssetType, CollectionKind, Entry, EntryFields, Item, UserCollection, UserId};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

/// Per-user wishlist and saved-items operations.
///
/// Owners arrive as `UserId`, which cannot be blank, so no owner check is
/// repeated here.
///
/// Every call is one read-modify-write against a single document. There is
/// no optimistic concurrency: two racing adds of the same new id may both
/// insert, and the later write wins.
#[derive(Clone)]
pub struct CollectionStore {
    backend: Arc<dyn CollectionBackend>,
}

impl CollectionStore {
    pub fn new(backend: Arc<dyn CollectionBackend>) -> Self {
        CollectionStore { backend }
    }

    /// Returns the caller's entries, provisioning an empty collection on
    /// first access.
    pub async fn list(
        &self,
        owner: &UserId,
        kind: CollectionKind,
    ) -> Result<Vec<Item>, CollectionError> {
        match self.backend.load(owner, kind).await? {
            Some(collection) => Ok(collection.items()),
            None => {
                let collection = UserCollection::empty(owner.clone(), kind);
                self.backend.save(&collection).await?;
                info!("Provisioned empty {} for {}", kind, owner);
                Ok(Vec::new())
            }
        }
    }

    /// Inserts `item_id` unless it is already present. Re-adding an existing
    /// id changes nothing and performs no write.
    pub async fn add(
        &self,
        owner: &UserId,
        kind: CollectionKind,
        item_id: &str,
        fields: EntryFields,
    ) -> Result<Vec<Item>, CollectionError> {
        let item_id = check_item_id(item_id)?;
        let entry = build_entry(kind, fields)?;

        let mut collection = self
            .backend
            .load(owner, kind)
            .await?
            .unwrap_or_else(|| UserCollection::empty(owner.clone(), kind));

        if !collection.insert_if_absent(item_id, entry) {
            debug!("{} already in {} for {}", item_id, kind, owner);
            return Ok(collection.items());
        }

        self.backend.save(&collection).await?;
        info!("Added {} to {} for {}", item_id, kind, owner);
        Ok(collection.items())
    }

    /// Removes `item_id` if present. Missing collections and ids are not
    /// errors.
    pub async fn remove(
        &self,
        owner: &UserId,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<Vec<Item>, CollectionError> {
        let item_id = check_item_id(item_id)?;

        let mut collection = match self.backend.load(owner, kind).await? {
            Some(collection) => collection,
            None => return Ok(Vec::new()),
        };

        if collection.remove(item_id) {
            self.backend.save(&collection).await?;
            info!("Removed {} from {} for {}", item_id, kind, owner);
        } else {
            debug!("{} not in {} for {}", item_id, kind, owner);
        }
        Ok(collection.items())
    }
}

/// Ids are used as keys exactly as given; padded ids are rejected rather
/// than rewritten.
fn check_item_id(item_id: &str) -> Result<&str, CollectionError> {
    if item_id.trim().is_empty() {
        return Err(CollectionError::InvalidInput("item id is required".to_string()));
    }
    if item_id.trim() != item_id {
        return Err(CollectionError::InvalidInput(format!(
            "item id '{}' has surrounding whitespace",
            item_id
        )));
    }
    Ok(item_id)
}

fn required(value: String, field: &str) -> Result<String, CollectionError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CollectionError::InvalidInput(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn build_entry(kind: CollectionKind, fields: EntryFields) -> Result<Entry, CollectionError> {
    let symbol = required(fields.symbol, "symbol")?;
    let name = required(fields.name, "name")?;
    let asset_type: AssetType = fields.asset_type.parse()?;

    let (notes, target_price) = match kind {
        // Wishlist entries carry only the common fields.
        CollectionKind::Wishlist => (None, None),
        CollectionKind::Saved => {
            if let Some(price) = fields.target_price {
                if !price.is_finite() || price <= 0.0 {
                    return Err(CollectionError::InvalidInput(format!(
                        "targetPrice must be a positive number, got {}",
                        price
                    )));
                }
            }
            let notes = fields.notes.filter(|n| !n.trim().is_empty());
            (notes, fields.target_price)
        }
    };

    Ok(Entry {
        symbol,
        name,
        asset_type,
        notes,
        target_price,
        added_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;

    fn store() -> (CollectionStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (CollectionStore::new(backend.clone()), backend)
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn bitcoin() -> EntryFields {
        EntryFields {
            symbol: "BTC".to_string(),
            name: "Bitcoin".to_string(),
            asset_type: "crypto".to_string(),
            ..Default::default()
        }
    }

    fn ethereum_saved() -> EntryFields {
        EntryFields {
            symbol: "ETH".to_string(),
            name: "Ethereum".to_string(),
            asset_type: "crypto".to_string(),
            notes: Some("buy the dip".to_string()),
            target_price: Some(3000.0),
        }
    }

    #[tokio::test]
    async fn list_provisions_empty_collection() {
        let (store, backend) = store();
        let items = store.list(&user("u1"), CollectionKind::Wishlist).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(backend.write_count(), 1);

        store.list(&user("u1"), CollectionKind::Wishlist).await.unwrap();
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let (store, backend) = store();
        let owner = user("u1");

        let first = store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", bitcoin())
            .await
            .unwrap();
        assert_eq!(backend.write_count(), 1);

        let mut changed = bitcoin();
        changed.name = "Bitcoin Core".to_string();
        let second = store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", changed)
            .await
            .unwrap();

        assert_eq!(backend.write_count(), 1);
        assert_eq!(first, second);
        assert_eq!(second[0].entry.name, "Bitcoin");
    }

    #[tokio::test]
    async fn wishlist_scenario_lists_promoted_id() {
        let (store, _) = store();
        let owner = user("u1");
        store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", bitcoin())
            .await
            .unwrap();

        let items = store.list(&owner, CollectionKind::Wishlist).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "bitcoin");
        assert_eq!(items[0].entry.symbol, "BTC");
        assert_eq!(items[0].entry.name, "Bitcoin");
        assert_eq!(items[0].entry.asset_type, AssetType::Crypto);
        let added_at = items[0].entry.added_at;

        store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", bitcoin())
            .await
            .unwrap();
        let again = store.list(&owner, CollectionKind::Wishlist).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].entry.added_at, added_at);
    }

    #[tokio::test]
    async fn wishlist_drops_saved_only_fields() {
        let (store, _) = store();
        let items = store
            .add(&user("u1"), CollectionKind::Wishlist, "eth", ethereum_saved())
            .await
            .unwrap();
        assert_eq!(items[0].entry.notes, None);
        assert_eq!(items[0].entry.target_price, None);
    }

    #[tokio::test]
    async fn saved_round_trip_then_remove() {
        let (store, backend) = store();
        let owner = user("u1");

        let items = store
            .add(&owner, CollectionKind::Saved, "eth", ethereum_saved())
            .await
            .unwrap();
        assert_eq!(items[0].entry.notes.as_deref(), Some("buy the dip"));
        assert_eq!(items[0].entry.target_price, Some(3000.0));

        let items = store.remove(&owner, CollectionKind::Saved, "eth").await.unwrap();
        assert!(items.is_empty());
        assert!(store.list(&owner, CollectionKind::Saved).await.unwrap().is_empty());
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn remove_absent_is_a_no_op() {
        let (store, backend) = store();
        let owner = user("u1");

        let items = store.remove(&owner, CollectionKind::Saved, "nope").await.unwrap();
        assert!(items.is_empty());
        assert_eq!(backend.write_count(), 0);

        store
            .add(&owner, CollectionKind::Saved, "eth", ethereum_saved())
            .await
            .unwrap();
        let items = store.remove(&owner, CollectionKind::Saved, "btc").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "eth");
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn owners_are_isolated() {
        let (store, _) = store();
        store
            .add(&user("u1"), CollectionKind::Wishlist, "bitcoin", bitcoin())
            .await
            .unwrap();

        assert!(store
            .list(&user("u2"), CollectionKind::Wishlist)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .list(&user("u1"), CollectionKind::Saved)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn ids_stay_unique_across_mixed_operations() {
        let (store, _) = store();
        let owner = user("u1");
        for id in ["bitcoin", "eth", "bitcoin", "sol", "eth"] {
            store
                .add(&owner, CollectionKind::Wishlist, id, bitcoin())
                .await
                .unwrap();
        }
        store
            .remove(&owner, CollectionKind::Wishlist, "eth")
            .await
            .unwrap();
        let items = store
            .add(&owner, CollectionKind::Wishlist, "eth", bitcoin())
            .await
            .unwrap();

        let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["bitcoin", "eth", "sol"]);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_without_writes() {
        let (store, backend) = store();
        let owner = user("u1");

        let err = store
            .add(&owner, CollectionKind::Wishlist, "  ", bitcoin())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::InvalidInput(_)));

        let mut no_symbol = bitcoin();
        no_symbol.symbol.clear();
        assert!(store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", no_symbol)
            .await
            .is_err());

        let mut bad_type = bitcoin();
        bad_type.asset_type = "bond".to_string();
        assert!(store
            .add(&owner, CollectionKind::Wishlist, "bitcoin", bad_type)
            .await
            .is_err());

        let mut bad_price = ethereum_saved();
        bad_price.target_price = Some(-5.0);
        assert!(store
            .add(&owner, CollectionKind::Saved, "eth", bad_price)
            .await
            .is_err());

        assert_eq!(backend.write_count(), 0);
    }

    struct FailingBackend;

    #[async_trait::async_trait]
    impl CollectionBackend for FailingBackend {
        async fn load(
            &self,
            _owner: &UserId,
            _kind: CollectionKind,
        ) -> Result<Option<UserCollection>, CollectionError> {
            Err(CollectionError::StoreUnavailable("connection refused".into()))
        }

        async fn save(&self, _collection: &UserCollection) -> Result<(), CollectionError> {
            Err(CollectionError::StoreUnavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn padded_ids_are_rejected_not_rewritten() {
        let (store, backend) = store();
        let owner = user("u1");

        let err = store
            .add(&owner, CollectionKind::Wishlist, " AAPL ", bitcoin())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::InvalidInput(_)));
        assert_eq!(backend.write_count(), 0);

        let items = store
            .add(&owner, CollectionKind::Wishlist, "AAPL", bitcoin())
            .await
            .unwrap();
        assert_eq!(items[0].id, "AAPL");
    }

    /// Loads return `existing`; every save fails.
    struct ReadOnlyBackend {
        existing: Option<UserCollection>,
    }

    #[async_trait::async_trait]
    impl CollectionBackend for ReadOnlyBackend {
        async fn load(
            &self,
            _owner: &UserId,
            _kind: CollectionKind,
        ) -> Result<Option<UserCollection>, CollectionError> {
            Ok(self.existing.clone())
        }

        async fn save(&self, _collection: &UserCollection) -> Result<(), CollectionError> {
            Err(CollectionError::StoreUnavailable("write timeout".into()))
        }
    }

    fn read_only(existing: Option<UserCollection>) -> CollectionStore {
        CollectionStore::new(Arc::new(ReadOnlyBackend { existing }))
    }

    #[tokio::test]
    async fn failed_writes_are_never_reported_as_success() {
        let owner = user("u1");

        let err = read_only(None)
            .list(&owner, CollectionKind::Wishlist)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::StoreUnavailable(_)));

        let err = read_only(None)
            .add(&owner, CollectionKind::Wishlist, "bitcoin", bitcoin())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::StoreUnavailable(_)));

        let mut existing = UserCollection::empty(owner.clone(), CollectionKind::Saved);
        existing.insert_if_absent(
            "eth",
            build_entry(CollectionKind::Saved, ethereum_saved()).unwrap(),
        );
        let err = read_only(Some(existing))
            .remove(&owner, CollectionKind::Saved, "eth")
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn backend_failures_surface_as_store_unavailable() {
        let store = CollectionStore::new(Arc::new(FailingBackend));
        let err = store
            .list(&user("u1"), CollectionKind::Saved)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectionError::StoreUnavailable(_)));
    }
}
