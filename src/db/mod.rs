pub mod cql;
pub mod memory;

use crate::error::CollectionError;
use crate::models::{CollectionKind, UserCollection, UserId};
use async_trait::async_trait;

pub use self::cql::ScyllaBackend;
pub use self::memory::MemoryBackend;

/// Document storage for user collections: one document per owner and kind.
///
/// `save` overwrites the whole document. There is no versioning, so two
/// concurrent read-modify-write cycles on the same document resolve as
/// last-write-wins.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    async fn load(
        &self,
        owner: &UserId,
        kind: CollectionKind,
    ) -> Result<Option<UserCollection>, CollectionError>;

    async fn save(&self, collection: &UserCollection) -> Result<(), CollectionError>;
}
