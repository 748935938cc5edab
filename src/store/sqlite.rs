//! SQLite-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use super::{ItemPatch, MoverPatch, NewItem, NewMover, Page, SortOrder, Store, StoreError};
use crate::error::Entity;
use crate::item::Item;
use crate::mover::{Mover, MoverWithItems, QuestState};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                weight_limit INTEGER NOT NULL,
                energy INTEGER NOT NULL,
                quest_state TEXT NOT NULL DEFAULT 'resting',
                missions_completed INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                weight INTEGER NOT NULL,
                mover_id INTEGER REFERENCES movers(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_mover ON items(mover_id)")
            .execute(pool)
            .await?;

        tracing::info!("Database migrations complete");
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Translate UNIQUE violations on `name` into a duplicate-name error.
fn insert_err(e: sqlx::Error, entity: Entity, name: &str) -> StoreError {
    if e.to_string().contains("UNIQUE constraint failed") {
        StoreError::DuplicateName(entity, name.to_string())
    } else {
        StoreError::Database(e.to_string())
    }
}

fn mover_from_row(row: &SqliteRow) -> Mover {
    let state: String = row.get("quest_state");
    Mover {
        id: row.get("id"),
        name: row.get("name"),
        weight_limit: row.get("weight_limit"),
        energy: row.get("energy"),
        quest_state: QuestState::from_str(&state).unwrap_or(QuestState::Resting),
        missions_completed: row.get("missions_completed"),
        version: row.get("version"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

fn item_from_row(row: &SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        weight: row.get("weight"),
        mover_id: row.get("mover_id"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_mover(&self, new: NewMover) -> Result<Mover, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO movers
                (name, weight_limit, energy, quest_state, missions_completed, version, created_at, updated_at)
                VALUES (?, ?, ?, ?, 0, 0, ?, ?)"#,
        )
        .bind(&new.name)
        .bind(new.weight_limit)
        .bind(new.energy)
        .bind(new.quest_state.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_err(e, Entity::Mover, &new.name))?;

        let id = result.last_insert_rowid();
        self.get_mover(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Mover, id))
    }

    async fn get_mover(&self, id: i64) -> Result<Option<Mover>, StoreError> {
        let row = sqlx::query("SELECT * FROM movers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.as_ref().map(mover_from_row))
    }

    async fn get_mover_with_items(&self, id: i64) -> Result<Option<MoverWithItems>, StoreError> {
        let Some(mover) = self.get_mover(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query("SELECT * FROM items WHERE mover_id = ? ORDER BY id")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let items = rows.iter().map(item_from_row).collect();
        Ok(Some(MoverWithItems { mover, items }))
    }

    async fn list_movers(&self, page: Page) -> Result<(Vec<Mover>, u64), StoreError> {
        let sql = match page.order {
            SortOrder::Asc => "SELECT * FROM movers ORDER BY id ASC LIMIT ? OFFSET ?",
            SortOrder::Desc => "SELECT * FROM movers ORDER BY id DESC LIMIT ? OFFSET ?",
        };
        let rows = sqlx::query(sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM movers")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("total");

        Ok((rows.iter().map(mover_from_row).collect(), total as u64))
    }

    async fn update_mover(&self, id: i64, patch: MoverPatch) -> Result<Mover, StoreError> {
        let existing = self
            .get_mover(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Mover, id))?;

        if let Some(name) = &patch.name {
            let taken = sqlx::query("SELECT id FROM movers WHERE name = ? AND id != ?")
                .bind(name)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            if taken.is_some() {
                return Err(StoreError::DuplicateName(Entity::Mover, name.clone()));
            }
        }

        let name = patch.name.unwrap_or(existing.name);
        let weight_limit = patch.weight_limit.unwrap_or(existing.weight_limit);
        let energy = patch.energy.unwrap_or(existing.energy);
        let quest_state = patch.quest_state.unwrap_or(existing.quest_state);

        sqlx::query(
            r#"UPDATE movers SET
                name = ?, weight_limit = ?, energy = ?, quest_state = ?,
                version = version + 1, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(&name)
        .bind(weight_limit)
        .bind(energy)
        .bind(quest_state.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_err(e, Entity::Mover, &name))?;

        self.get_mover(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Mover, id))
    }

    async fn top_movers(&self, limit: u32) -> Result<Vec<Mover>, StoreError> {
        let rows =
            sqlx::query("SELECT * FROM movers ORDER BY missions_completed DESC, id ASC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(rows.iter().map(mover_from_row).collect())
    }

    async fn attach_items(
        &self,
        mover_id: i64,
        expected_version: i64,
        item_ids: &[i64],
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Version CAS on the mover row; a stale read rolls the whole load back.
        let result = sqlx::query(
            "UPDATE movers SET quest_state = ?, version = version + 1, updated_at = ? \
             WHERE id = ? AND version = ?",
        )
        .bind(QuestState::Loading.as_str())
        .bind(now)
        .bind(mover_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict(mover_id));
        }

        let sql = format!(
            "UPDATE items SET mover_id = ?, updated_at = ? \
             WHERE mover_id IS NULL AND id IN ({})",
            in_placeholders(item_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(mover_id).bind(now);
        for id in item_ids {
            query = query.bind(id);
        }
        let result = query.execute(&mut *tx).await.map_err(db_err)?;

        // An item that vanished or got claimed since the read counts as a lost race.
        if result.rows_affected() != item_ids.len() as u64 {
            return Err(StoreError::VersionConflict(mover_id));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn begin_mission(&self, mover_id: i64) -> Result<Mover, StoreError> {
        let result = sqlx::query(
            "UPDATE movers SET quest_state = ?, version = version + 1, updated_at = ? WHERE id = ?",
        )
        .bind(QuestState::OnAMission.as_str())
        .bind(Utc::now())
        .bind(mover_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Mover, mover_id));
        }

        self.get_mover(mover_id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Mover, mover_id))
    }

    async fn finish_mission(&self, mover_id: i64) -> Result<Mover, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let result = sqlx::query(
            r#"UPDATE movers SET
                quest_state = ?, missions_completed = missions_completed + 1,
                version = version + 1, updated_at = ?
            WHERE id = ?"#,
        )
        .bind(QuestState::Done.as_str())
        .bind(now)
        .bind(mover_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(Entity::Mover, mover_id));
        }

        sqlx::query("UPDATE items SET mover_id = NULL, updated_at = ? WHERE mover_id = ?")
            .bind(now)
            .bind(mover_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        self.get_mover(mover_id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Mover, mover_id))
    }

    async fn create_item(&self, new: NewItem) -> Result<Item, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO items (name, weight, mover_id, created_at, updated_at) \
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(&new.name)
        .bind(new.weight)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_err(e, Entity::Item, &new.name))?;

        let id = result.last_insert_rowid();
        self.get_item(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Item, id))
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.as_ref().map(item_from_row))
    }

    async fn get_items(&self, ids: &[i64]) -> Result<Vec<Item>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM items WHERE id IN ({}) ORDER BY id",
            in_placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn list_items(&self, page: Page) -> Result<(Vec<Item>, u64), StoreError> {
        let sql = match page.order {
            SortOrder::Asc => "SELECT * FROM items ORDER BY id ASC LIMIT ? OFFSET ?",
            SortOrder::Desc => "SELECT * FROM items ORDER BY id DESC LIMIT ? OFFSET ?",
        };
        let rows = sqlx::query(sql)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("total");

        Ok((rows.iter().map(item_from_row).collect(), total as u64))
    }

    async fn update_item(&self, id: i64, patch: ItemPatch) -> Result<Item, StoreError> {
        let existing = self
            .get_item(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Item, id))?;

        if let Some(name) = &patch.name {
            let taken = sqlx::query("SELECT id FROM items WHERE name = ? AND id != ?")
                .bind(name)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            if taken.is_some() {
                return Err(StoreError::DuplicateName(Entity::Item, name.clone()));
            }
        }

        let name = patch.name.unwrap_or(existing.name);
        let weight = patch.weight.unwrap_or(existing.weight);

        sqlx::query("UPDATE items SET name = ?, weight = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(weight)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_err(e, Entity::Item, &name))?;

        self.get_item(id)
            .await?
            .ok_or(StoreError::NotFound(Entity::Item, id))
    }

    async fn delete_item(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}
