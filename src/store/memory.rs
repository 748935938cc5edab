//! In-memory store.
//!
//! Backs the quest-service and router tests. One lock guards both maps, so
//! every operation is atomic exactly like its SQLite counterpart; nothing
//! awaits while the lock is held.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{ItemPatch, MoverPatch, NewItem, NewMover, Page, SortOrder, Store, StoreError};
use crate::error::Entity;
use crate::item::Item;
use crate::mover::{Mover, MoverWithItems, QuestState};

#[derive(Default)]
struct Inner {
    movers: HashMap<i64, Mover>,
    items: HashMap<i64, Item>,
    next_mover_id: i64,
    next_item_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_ids<T>(map: &HashMap<i64, T>, order: SortOrder) -> Vec<i64> {
    let mut ids: Vec<i64> = map.keys().copied().collect();
    ids.sort_unstable();
    if let SortOrder::Desc = order {
        ids.reverse();
    }
    ids
}

fn page_slice(ids: &[i64], page: Page) -> &[i64] {
    let start = (page.offset as usize).min(ids.len());
    let end = (start + page.limit as usize).min(ids.len());
    &ids[start..end]
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_mover(&self, new: NewMover) -> Result<Mover, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.movers.values().any(|m| m.name == new.name) {
            return Err(StoreError::DuplicateName(Entity::Mover, new.name));
        }

        inner.next_mover_id += 1;
        let now = Utc::now();
        let mover = Mover {
            id: inner.next_mover_id,
            name: new.name,
            weight_limit: new.weight_limit,
            energy: new.energy,
            quest_state: new.quest_state,
            missions_completed: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        inner.movers.insert(mover.id, mover.clone());
        Ok(mover)
    }

    async fn get_mover(&self, id: i64) -> Result<Option<Mover>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.movers.get(&id).cloned())
    }

    async fn get_mover_with_items(&self, id: i64) -> Result<Option<MoverWithItems>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(mover) = inner.movers.get(&id).cloned() else {
            return Ok(None);
        };

        let mut items: Vec<Item> = inner
            .items
            .values()
            .filter(|item| item.mover_id == Some(id))
            .cloned()
            .collect();
        items.sort_unstable_by_key(|item| item.id);

        Ok(Some(MoverWithItems { mover, items }))
    }

    async fn list_movers(&self, page: Page) -> Result<(Vec<Mover>, u64), StoreError> {
        let inner = self.inner.lock().unwrap();
        let ids = sorted_ids(&inner.movers, page.order);
        let movers = page_slice(&ids, page)
            .iter()
            .map(|id| inner.movers[id].clone())
            .collect();
        Ok((movers, inner.movers.len() as u64))
    }

    async fn update_mover(&self, id: i64, patch: MoverPatch) -> Result<Mover, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(name) = &patch.name {
            if inner.movers.values().any(|m| m.id != id && m.name == *name) {
                return Err(StoreError::DuplicateName(Entity::Mover, name.clone()));
            }
        }

        let mover = inner
            .movers
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Mover, id))?;

        if let Some(name) = patch.name {
            mover.name = name;
        }
        if let Some(weight_limit) = patch.weight_limit {
            mover.weight_limit = weight_limit;
        }
        if let Some(energy) = patch.energy {
            mover.energy = energy;
        }
        if let Some(quest_state) = patch.quest_state {
            mover.quest_state = quest_state;
        }
        mover.version += 1;
        mover.updated_at = Utc::now();

        Ok(mover.clone())
    }

    async fn top_movers(&self, limit: u32) -> Result<Vec<Mover>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut movers: Vec<Mover> = inner.movers.values().cloned().collect();
        movers.sort_unstable_by_key(|m| (std::cmp::Reverse(m.missions_completed), m.id));
        movers.truncate(limit as usize);
        Ok(movers)
    }

    async fn attach_items(
        &self,
        mover_id: i64,
        expected_version: i64,
        item_ids: &[i64],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();

        let conflict = || StoreError::VersionConflict(mover_id);

        match inner.movers.get(&mover_id) {
            Some(mover) if mover.version == expected_version => {}
            _ => return Err(conflict()),
        }
        let all_free = item_ids.iter().all(|id| {
            inner
                .items
                .get(id)
                .is_some_and(|item| item.mover_id.is_none())
        });
        if !all_free {
            return Err(conflict());
        }

        let now = Utc::now();
        for id in item_ids {
            let item = inner.items.get_mut(id).unwrap();
            item.mover_id = Some(mover_id);
            item.updated_at = now;
        }
        let mover = inner.movers.get_mut(&mover_id).unwrap();
        mover.quest_state = QuestState::Loading;
        mover.version += 1;
        mover.updated_at = now;

        Ok(())
    }

    async fn begin_mission(&self, mover_id: i64) -> Result<Mover, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mover = inner
            .movers
            .get_mut(&mover_id)
            .ok_or(StoreError::NotFound(Entity::Mover, mover_id))?;

        mover.quest_state = QuestState::OnAMission;
        mover.version += 1;
        mover.updated_at = Utc::now();

        Ok(mover.clone())
    }

    async fn finish_mission(&self, mover_id: i64) -> Result<Mover, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.movers.contains_key(&mover_id) {
            return Err(StoreError::NotFound(Entity::Mover, mover_id));
        }

        let now = Utc::now();
        for item in inner.items.values_mut() {
            if item.mover_id == Some(mover_id) {
                item.mover_id = None;
                item.updated_at = now;
            }
        }

        let mover = inner.movers.get_mut(&mover_id).unwrap();
        mover.quest_state = QuestState::Done;
        mover.missions_completed += 1;
        mover.version += 1;
        mover.updated_at = now;

        Ok(mover.clone())
    }

    async fn create_item(&self, new: NewItem) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.items.values().any(|i| i.name == new.name) {
            return Err(StoreError::DuplicateName(Entity::Item, new.name));
        }

        inner.next_item_id += 1;
        let now = Utc::now();
        let item = Item {
            id: inner.next_item_id,
            name: new.name,
            weight: new.weight,
            mover_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.items.get(&id).cloned())
    }

    async fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Item> = ids
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect();
        items.sort_unstable_by_key(|item| item.id);
        Ok(items)
    }

    async fn list_items(&self, page: Page) -> Result<(Vec<Item>, u64), StoreError> {
        let inner = self.inner.lock().unwrap();
        let ids = sorted_ids(&inner.items, page.order);
        let items = page_slice(&ids, page)
            .iter()
            .map(|id| inner.items[id].clone())
            .collect();
        Ok((items, inner.items.len() as u64))
    }

    async fn update_item(&self, id: i64, patch: ItemPatch) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(name) = &patch.name {
            if inner.items.values().any(|i| i.id != id && i.name == *name) {
                return Err(StoreError::DuplicateName(Entity::Item, name.clone()));
            }
        }

        let item = inner
            .items
            .get_mut(&id)
            .ok_or(StoreError::NotFound(Entity::Item, id))?;

        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(weight) = patch.weight {
            item.weight = weight;
        }
        item.updated_at = Utc::now();

        Ok(item.clone())
    }

    async fn delete_item(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.items.remove(&id).is_some())
    }
}
