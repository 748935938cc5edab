//! Request payloads and their validation.
//!
//! Each DTO carries an explicit `validate` method returning field-level
//! errors, kept separate from the transport so the same checks run no matter
//! how the payload arrived. `ApiJson` funnels body-parse failures into the
//! same error shape.

use async_trait::async_trait;
use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::{ApiError, FieldError};
use crate::mover::QuestState;
use crate::store::{Page, SortOrder};

const MAX_NAME_LEN: usize = 255;

fn check_name(name: &str, field: &str, errors: &mut Vec<FieldError>) {
    if name.trim().is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    } else if name.len() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// ============================================================================
// Mover payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMoverRequest {
    pub name: String,
    pub weight_limit: i64,
    pub energy: i64,
    pub quest_state: Option<QuestState>,
}

impl CreateMoverRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_name(&self.name, "name", &mut errors);
        if self.weight_limit <= 0 {
            errors.push(FieldError::new("weightLimit", "must be a positive integer"));
        }
        finish(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMoverRequest {
    pub name: Option<String>,
    pub weight_limit: Option<i64>,
    pub energy: Option<i64>,
    pub quest_state: Option<QuestState>,
}

impl UpdateMoverRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, "name", &mut errors);
        }
        if let Some(limit) = self.weight_limit {
            if limit <= 0 {
                errors.push(FieldError::new("weightLimit", "must be a positive integer"));
            }
        }
        finish(errors)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadItemsRequest {
    pub item_ids: Vec<i64>,
}

impl LoadItemsRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if self.item_ids.is_empty() {
            errors.push(FieldError::new("itemIds", "must not be empty"));
        }
        if self.item_ids.iter().any(|id| *id <= 0) {
            errors.push(FieldError::new("itemIds", "ids must be positive integers"));
        }
        let unique: HashSet<i64> = self.item_ids.iter().copied().collect();
        if unique.len() != self.item_ids.len() {
            errors.push(FieldError::new("itemIds", "must not contain duplicates"));
        }
        finish(errors)
    }
}

// ============================================================================
// Item payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub name: String,
    pub weight: i64,
}

impl CreateItemRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_name(&self.name, "name", &mut errors);
        if self.weight <= 0 {
            errors.push(FieldError::new("weight", "must be a positive integer"));
        }
        finish(errors)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub weight: Option<i64>,
}

impl UpdateItemRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, "name", &mut errors);
        }
        if let Some(weight) = self.weight {
            if weight <= 0 {
                errors.push(FieldError::new("weight", "must be a positive integer"));
            }
        }
        finish(errors)
    }
}

// ============================================================================
// List query
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order: Option<String>,
}

impl ListQuery {
    /// Resolve into page parameters, clamping the limit to the configured cap.
    pub fn page(&self, default_limit: u32, max_limit: u32) -> Result<Page, ApiError> {
        let order = match self.order.as_deref() {
            None => SortOrder::Desc,
            Some(s) if s.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            Some(s) if s.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            Some(_) => {
                return Err(ApiError::validation(vec![FieldError::new(
                    "order",
                    "must be 'asc' or 'desc'",
                )]));
            }
        };

        Ok(Page {
            limit: self.limit.unwrap_or(default_limit).clamp(1, max_limit),
            offset: self.offset.unwrap_or(0),
            order,
        })
    }
}

// ============================================================================
// JSON extractor
// ============================================================================

/// `Json` with rejections translated into the API's validation-error shape.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::validation(vec![FieldError::new(
                "body",
                rejection.body_text(),
            )])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mover_valid() {
        let req = CreateMoverRequest {
            name: "Atlas".to_string(),
            weight_limit: 50,
            energy: 10,
            quest_state: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_mover_rejects_bad_fields() {
        let req = CreateMoverRequest {
            name: "   ".to_string(),
            weight_limit: 0,
            energy: 10,
            quest_state: None,
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "name"));
        assert!(errors.iter().any(|e| e.field == "weightLimit"));
    }

    #[test]
    fn test_create_item_rejects_long_name() {
        let req = CreateItemRequest {
            name: "x".repeat(256),
            weight: 3,
        };
        let errors = req.validate().unwrap_err();
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_load_items_constraints() {
        let empty = LoadItemsRequest { item_ids: vec![] };
        assert!(empty.validate().is_err());

        let dupes = LoadItemsRequest {
            item_ids: vec![1, 2, 2],
        };
        let errors = dupes.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicates")));

        let negative = LoadItemsRequest {
            item_ids: vec![1, -4],
        };
        assert!(negative.validate().is_err());

        let ok = LoadItemsRequest {
            item_ids: vec![1, 2, 3],
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_list_query_defaults_and_clamp() {
        let query = ListQuery::default();
        let page = query.page(10, 100).unwrap();
        assert_eq!(page.limit, 10);
        assert_eq!(page.offset, 0);
        assert!(matches!(page.order, SortOrder::Desc));

        let query = ListQuery {
            limit: Some(5000),
            offset: Some(20),
            order: Some("ASC".to_string()),
        };
        let page = query.page(10, 100).unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset, 20);
        assert!(matches!(page.order, SortOrder::Asc));
    }

    #[test]
    fn test_list_query_rejects_unknown_order() {
        let query = ListQuery {
            limit: None,
            offset: None,
            order: Some("sideways".to_string()),
        };
        let err = query.page(10, 100).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
