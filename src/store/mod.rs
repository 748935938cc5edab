//! Persistence seam.
//!
//! Handlers and the quest service talk to an injected [`Store`] trait object;
//! the SQLite implementation backs the server, the in-memory one backs tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Entity;
use crate::item::Item;
use crate::mover::{Mover, MoverWithItems, QuestState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} {1} not found")]
    NotFound(Entity, i64),

    #[error("a {0} named '{1}' already exists")]
    DuplicateName(Entity, String),

    /// The guarded write lost a race; the caller re-reads and retries.
    #[error("mover {0} was modified concurrently")]
    VersionConflict(i64),

    #[error("database error: {0}")]
    Database(String),
}

#[derive(Debug, Clone)]
pub struct NewMover {
    pub name: String,
    pub weight_limit: i64,
    pub energy: i64,
    pub quest_state: QuestState,
}

#[derive(Debug, Clone, Default)]
pub struct MoverPatch {
    pub name: Option<String>,
    pub weight_limit: Option<i64>,
    pub energy: Option<i64>,
    pub quest_state: Option<QuestState>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub weight: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
}

/// Storage operations for both entities.
///
/// Listing returns the page plus the total row count. The quest transitions
/// (`attach_items`, `begin_mission`, `finish_mission`) are atomic in every
/// implementation; `attach_items` additionally requires the mover version the
/// caller read, and fails with [`StoreError::VersionConflict`] if the row has
/// moved on or any requested item is no longer unassigned.
#[async_trait]
pub trait Store: Send + Sync {
    // Movers
    async fn create_mover(&self, new: NewMover) -> Result<Mover, StoreError>;
    async fn get_mover(&self, id: i64) -> Result<Option<Mover>, StoreError>;
    async fn get_mover_with_items(&self, id: i64) -> Result<Option<MoverWithItems>, StoreError>;
    async fn list_movers(&self, page: Page) -> Result<(Vec<Mover>, u64), StoreError>;
    async fn update_mover(&self, id: i64, patch: MoverPatch) -> Result<Mover, StoreError>;
    async fn top_movers(&self, limit: u32) -> Result<Vec<Mover>, StoreError>;

    // Quest transitions
    async fn attach_items(
        &self,
        mover_id: i64,
        expected_version: i64,
        item_ids: &[i64],
    ) -> Result<(), StoreError>;
    async fn begin_mission(&self, mover_id: i64) -> Result<Mover, StoreError>;
    async fn finish_mission(&self, mover_id: i64) -> Result<Mover, StoreError>;

    // Items
    async fn create_item(&self, new: NewItem) -> Result<Item, StoreError>;
    async fn get_item(&self, id: i64) -> Result<Option<Item>, StoreError>;
    async fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>, StoreError>;
    async fn list_items(&self, page: Page) -> Result<(Vec<Item>, u64), StoreError>;
    async fn update_item(&self, id: i64, patch: ItemPatch) -> Result<Item, StoreError>;
    async fn delete_item(&self, id: i64) -> Result<bool, StoreError>;
}
