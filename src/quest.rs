//! Quest-state transition service.
//!
//! Composes the pure rules in [`crate::mover`] with store primitives. The
//! load path re-reads and re-checks under a version compare-and-swap, so two
//! concurrent loads cannot both slip past the capacity check.

use tracing::info;

use crate::error::{ApiError, Entity};
use crate::mover::{self, Mover, MoverWithItems};
use crate::store::{Store, StoreError};

/// Lost CAS races are retried with a fresh read before giving up.
const MAX_LOAD_ATTEMPTS: u32 = 3;

/// Attach `item_ids` to the mover and flip it into `loading`.
///
/// All-or-nothing: any missing item, state violation, or capacity overflow
/// leaves the mover and every item untouched.
pub async fn load_items(
    store: &dyn Store,
    mover_id: i64,
    item_ids: &[i64],
) -> Result<MoverWithItems, ApiError> {
    for _ in 0..MAX_LOAD_ATTEMPTS {
        let loaded = store
            .get_mover_with_items(mover_id)
            .await?
            .ok_or_else(|| ApiError::not_found(Entity::Mover, mover_id))?;

        mover::check_loadable(loaded.mover.quest_state)?;

        let requested = store.get_items(item_ids).await?;
        if requested.len() != item_ids.len() {
            let missing = item_ids
                .iter()
                .find(|id| !requested.iter().any(|item| item.id == **id))
                .copied()
                .unwrap_or(0);
            return Err(ApiError::not_found(Entity::Item, missing));
        }
        if let Some(held) = requested.iter().find(|item| item.mover_id.is_some()) {
            return Err(ApiError::invalid_state(format!(
                "item {} is already loaded on a mover",
                held.id
            )));
        }

        let added: i64 = requested.iter().map(|item| item.weight).sum();
        mover::check_capacity(loaded.mover.weight_limit, loaded.held_weight(), added)?;

        match store
            .attach_items(mover_id, loaded.mover.version, item_ids)
            .await
        {
            Ok(()) => {
                info!("mover {} loaded with items {:?}", mover_id, item_ids);
                return store
                    .get_mover_with_items(mover_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found(Entity::Mover, mover_id));
            }
            Err(StoreError::VersionConflict(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::Conflict)
}

/// Put the mover on a mission. No check on the prior state or held items.
pub async fn start_mission(store: &dyn Store, mover_id: i64) -> Result<Mover, ApiError> {
    let mover = store.begin_mission(mover_id).await?;
    info!("mover {} started a mission", mover_id);
    Ok(mover)
}

/// Finish the mission: unload everything, mark `done`, bump the counter.
pub async fn end_mission(store: &dyn Store, mover_id: i64) -> Result<Mover, ApiError> {
    let mover = store.finish_mission(mover_id).await?;
    info!(
        "mover {} has completed the mission and unloaded all items",
        mover_id
    );
    Ok(mover)
}

/// The movers who completed the most missions, best first.
pub async fn top_movers(store: &dyn Store, limit: u32) -> Result<Vec<Mover>, ApiError> {
    Ok(store.top_movers(limit).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mover::QuestState;
    use crate::store::memory::MemoryStore;
    use crate::store::{NewItem, NewMover};

    async fn mover_with_limit(store: &MemoryStore, name: &str, weight_limit: i64) -> Mover {
        store
            .create_mover(NewMover {
                name: name.to_string(),
                weight_limit,
                energy: 10,
                quest_state: QuestState::Resting,
            })
            .await
            .unwrap()
    }

    async fn item_with_weight(store: &MemoryStore, name: &str, weight: i64) -> i64 {
        store
            .create_item(NewItem {
                name: name.to_string(),
                weight,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_load_to_exact_capacity_then_overflow() {
        let store = MemoryStore::new();
        let mover = mover_with_limit(&store, "Atlas", 10).await;
        let a = item_with_weight(&store, "a", 4).await;
        let b = item_with_weight(&store, "b", 6).await;

        let loaded = load_items(&store, mover.id, &[a, b]).await.unwrap();
        assert_eq!(loaded.mover.quest_state, QuestState::Loading);
        assert_eq!(loaded.held_weight(), 10);

        let c = item_with_weight(&store, "c", 1).await;
        let err = load_items(&store, mover.id, &[c]).await.unwrap_err();
        assert_eq!(err.error_code(), "CAPACITY_EXCEEDED");

        // The failed load attached nothing
        let after = store.get_mover_with_items(mover.id).await.unwrap().unwrap();
        assert_eq!(after.items.len(), 2);
    }

    #[tokio::test]
    async fn test_load_rejected_while_on_mission() {
        let store = MemoryStore::new();
        let mover = mover_with_limit(&store, "Atlas", 100).await;
        let a = item_with_weight(&store, "a", 1).await;

        start_mission(&store, mover.id).await.unwrap();

        let err = load_items(&store, mover.id, &[a]).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_load_missing_mover_and_item() {
        let store = MemoryStore::new();

        let err = load_items(&store, 5, &[1]).await.unwrap_err();
        assert_eq!(err.error_code(), "MOVER_NOT_FOUND");

        let mover = mover_with_limit(&store, "Atlas", 10).await;
        let err = load_items(&store, mover.id, &[42]).await.unwrap_err();
        assert_eq!(err.error_code(), "ITEM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_load_rejects_already_held_item() {
        let store = MemoryStore::new();
        let atlas = mover_with_limit(&store, "Atlas", 10).await;
        let hermes = mover_with_limit(&store, "Hermes", 10).await;
        let a = item_with_weight(&store, "a", 2).await;

        load_items(&store, atlas.id, &[a]).await.unwrap();

        let err = load_items(&store, hermes.id, &[a]).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn test_end_mission_unloads_and_counts() {
        let store = MemoryStore::new();
        let mover = mover_with_limit(&store, "Atlas", 20).await;
        for (name, weight) in [("a", 3), ("b", 4), ("c", 5)] {
            let id = item_with_weight(&store, name, weight).await;
            load_items(&store, mover.id, &[id]).await.unwrap();
        }

        start_mission(&store, mover.id).await.unwrap();
        end_mission(&store, mover.id).await.unwrap();
        start_mission(&store, mover.id).await.unwrap();
        let done = end_mission(&store, mover.id).await.unwrap();
        assert_eq!(done.missions_completed, 2);

        // Third run: load 3 items again, end, counter reaches 3 with zero items held
        for name in ["d", "e", "f"] {
            let id = item_with_weight(&store, name, 1).await;
            load_items(&store, mover.id, &[id]).await.unwrap();
        }
        let done = end_mission(&store, mover.id).await.unwrap();
        assert_eq!(done.quest_state, QuestState::Done);
        assert_eq!(done.missions_completed, 3);

        let after = store.get_mover_with_items(mover.id).await.unwrap().unwrap();
        assert!(after.items.is_empty());
    }

    #[tokio::test]
    async fn test_done_mover_is_loadable_again() {
        let store = MemoryStore::new();
        let mover = mover_with_limit(&store, "Atlas", 10).await;
        let a = item_with_weight(&store, "a", 2).await;

        load_items(&store, mover.id, &[a]).await.unwrap();
        start_mission(&store, mover.id).await.unwrap();
        end_mission(&store, mover.id).await.unwrap();

        let b = item_with_weight(&store, "b", 2).await;
        let loaded = load_items(&store, mover.id, &[b]).await.unwrap();
        assert_eq!(loaded.mover.quest_state, QuestState::Loading);
        assert_eq!(loaded.items.len(), 1);
    }

    #[tokio::test]
    async fn test_top_movers_respects_limit() {
        let store = MemoryStore::new();
        let a = mover_with_limit(&store, "a", 10).await;
        mover_with_limit(&store, "b", 10).await;
        let c = mover_with_limit(&store, "c", 10).await;

        end_mission(&store, c.id).await.unwrap();
        end_mission(&store, c.id).await.unwrap();
        end_mission(&store, a.id).await.unwrap();

        let top = top_movers(&store, 2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, c.id);
        assert_eq!(top[1].id, a.id);
        assert_eq!(top[0].missions_completed, 2);
    }
}
