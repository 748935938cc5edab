//! Mover entity and quest-state rules.
//!
//! The transition checks live here as pure functions so they can be exercised
//! without a store behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::item::Item;

/// The mover's current phase of the delivery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestState {
    /// Idle, nothing attached yet
    Resting,
    /// Cargo attached, mission not started
    Loading,
    /// Mid-mission, cargo locked
    OnAMission,
    /// Mission finished, cargo unloaded
    Done,
}

impl QuestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestState::Resting => "resting",
            QuestState::Loading => "loading",
            QuestState::OnAMission => "on_a_mission",
            QuestState::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "resting" => Some(QuestState::Resting),
            "loading" => Some(QuestState::Loading),
            "on_a_mission" => Some(QuestState::OnAMission),
            "done" => Some(QuestState::Done),
            _ => None,
        }
    }
}

impl Default for QuestState {
    fn default() -> Self {
        QuestState::Resting
    }
}

/// A cargo-carrying agent with a weight capacity and a quest state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub id: i64,
    pub name: String,
    pub weight_limit: i64,
    pub energy: i64,
    pub quest_state: QuestState,
    pub missions_completed: i64,
    /// Bumped on every mutation; guards the load path. Not part of the wire shape.
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A mover together with the items it currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct MoverWithItems {
    #[serde(flatten)]
    pub mover: Mover,
    pub items: Vec<Item>,
}

impl MoverWithItems {
    pub fn held_weight(&self) -> i64 {
        self.items.iter().map(|item| item.weight).sum()
    }
}

/// Movers accept cargo in every state except mid-mission.
pub fn check_loadable(state: QuestState) -> Result<(), ApiError> {
    if state == QuestState::OnAMission {
        return Err(ApiError::invalid_state(
            "mover is on a mission and cannot be loaded",
        ));
    }
    Ok(())
}

/// Held weight plus the new cargo may never exceed the mover's limit.
pub fn check_capacity(weight_limit: i64, held: i64, added: i64) -> Result<(), ApiError> {
    let attempted = held + added;
    if attempted > weight_limit {
        return Err(ApiError::CapacityExceeded {
            limit: weight_limit,
            attempted,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quest_state_round_trip() {
        for state in [
            QuestState::Resting,
            QuestState::Loading,
            QuestState::OnAMission,
            QuestState::Done,
        ] {
            assert_eq!(QuestState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(QuestState::from_str("flying"), None);
    }

    #[test]
    fn test_quest_state_json_shape() {
        let json = serde_json::to_string(&QuestState::OnAMission).unwrap();
        assert_eq!(json, "\"on_a_mission\"");

        let state: QuestState = serde_json::from_str("\"resting\"").unwrap();
        assert_eq!(state, QuestState::Resting);
    }

    #[test]
    fn test_loadable_states() {
        assert!(check_loadable(QuestState::Resting).is_ok());
        assert!(check_loadable(QuestState::Loading).is_ok());
        assert!(check_loadable(QuestState::Done).is_ok());

        let err = check_loadable(QuestState::OnAMission).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[test]
    fn test_capacity_boundary() {
        // Exactly at the limit is allowed
        assert!(check_capacity(10, 4, 6).is_ok());
        assert!(check_capacity(10, 0, 10).is_ok());

        // One over is not
        let err = check_capacity(10, 10, 1).unwrap_err();
        match err {
            ApiError::CapacityExceeded { limit, attempted } => {
                assert_eq!(limit, 10);
                assert_eq!(attempted, 11);
            }
            other => panic!("expected CapacityExceeded, got {other:?}"),
        }
    }
}
