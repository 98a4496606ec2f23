use crate::auth::Identity;
use crate::error::CollectionError;
use crate::models::{CollectionKind, EntryFields, Item, UserId};
use crate::store::CollectionStore;
use log::{info, log, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Deserialize)]
struct AddRequest {
    item: ItemPayload,
}

#[derive(Deserialize)]
struct ItemPayload {
    #[serde(default)]
    id: String,
    #[serde(flatten)]
    fields: EntryFields,
}

/// Accepts both `{ "id": ... }` and `{ "item": { "id": ... } }`.
#[derive(Deserialize)]
struct RemoveRequest {
    id: Option<String>,
    item: Option<ItemRef>,
}

#[derive(Deserialize)]
struct ItemRef {
    id: String,
}

impl RemoveRequest {
    fn into_item_id(self) -> Option<String> {
        self.item.map(|item| item.id).or(self.id)
    }
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<Item>,
}

pub fn routes(
    store: Arc<CollectionStore>,
    identity: Arc<Identity>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health = warp::path::end()
        .and(warp::get())
        .map(|| "API is running");

    let collection = warp::path!("collections" / CollectionKind)
        .or(warp::path!("api" / CollectionKind))
        .unify();

    let list = collection
        .clone()
        .and(warp::get())
        .and(with_identity(identity.clone()))
        .and(with_store(store.clone()))
        .and_then(list_handler);

    let add = collection
        .clone()
        .and(warp::post())
        .and(with_identity(identity.clone()))
        .and(with_store(store.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(add_handler);

    let remove = collection
        .and(warp::delete())
        .and(with_identity(identity))
        .and(with_store(store))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(remove_handler);

    health.or(list).or(add).or(remove)
}

fn with_store(
    store: Arc<CollectionStore>,
) -> impl Filter<Extract = (Arc<CollectionStore>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || store.clone())
}

/// Resolves the `Authorization` header to the caller's id or rejects with
/// `Unauthorized`.
fn with_identity(
    identity: Arc<Identity>,
) -> impl Filter<Extract = (UserId,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let identity = identity.clone();
        async move {
            identity.resolve(header.as_deref()).map_err(|e| {
                warn!("Rejected request: {}", e);
                warp::reject::custom(e)
            })
        }
    })
}

fn items_reply(items: Vec<Item>) -> warp::reply::Json {
    warp::reply::json(&ItemsResponse { items })
}

async fn list_handler(
    kind: CollectionKind,
    owner: UserId,
    store: Arc<CollectionStore>,
) -> Result<impl Reply, Rejection> {
    match store.list(&owner, kind).await {
        Ok(items) => {
            info!("Listed {} {} items for {}", items.len(), kind, owner);
            Ok(items_reply(items))
        }
        Err(e) => {
            log!(e.log_level(), "Failed to list {} for {}: {}", kind, owner, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn add_handler(
    kind: CollectionKind,
    owner: UserId,
    store: Arc<CollectionStore>,
    request: AddRequest,
) -> Result<impl Reply, Rejection> {
    let ItemPayload { id, fields } = request.item;
    match store.add(&owner, kind, &id, fields).await {
        Ok(items) => Ok(items_reply(items)),
        Err(e) => {
            log!(
                e.log_level(),
                "Failed to add {} to {} for {}: {}",
                id,
                kind,
                owner,
                e
            );
            Err(warp::reject::custom(e))
        }
    }
}

async fn remove_handler(
    kind: CollectionKind,
    owner: UserId,
    store: Arc<CollectionStore>,
    request: RemoveRequest,
) -> Result<impl Reply, Rejection> {
    let id = match request.into_item_id() {
        Some(id) => id,
        None => {
            return Err(warp::reject::custom(CollectionError::InvalidInput(
                "item id is required".to_string(),
            )))
        }
    };
    match store.remove(&owner, kind, &id).await {
        Ok(items) => Ok(items_reply(items)),
        Err(e) => {
            log!(
                e.log_level(),
                "Failed to remove {} from {} for {}: {}",
                id,
                kind,
                owner,
                e
            );
            Err(warp::reject::custom(e))
        }
    }
}
