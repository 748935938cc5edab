use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    routing::post,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
mod dto;
mod error;
mod item;
mod mover;
mod quest;
mod store;

use config::ServerConfig;
use dto::{
    ApiJson, CreateItemRequest, CreateMoverRequest, ListQuery, LoadItemsRequest,
    UpdateItemRequest, UpdateMoverRequest,
};
use error::{ApiError, Entity};
use item::Item;
use mover::{Mover, MoverWithItems};
use store::sqlite::SqliteStore;
use store::{ItemPatch, MoverPatch, NewItem, NewMover, Store};

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
    config: Arc<ServerConfig>,
}

// ============================================================================
// HTTP Handlers - Movers
// ============================================================================

#[derive(Serialize)]
struct MoverResponse {
    success: bool,
    mover: Mover,
}

#[derive(Serialize)]
struct LoadedMoverResponse {
    success: bool,
    mover: MoverWithItems,
}

#[derive(Serialize)]
struct MoverListResponse {
    success: bool,
    total: u64,
    limit: u32,
    offset: u32,
    movers: Vec<Mover>,
}

#[derive(Serialize)]
struct TopMoversResponse {
    success: bool,
    movers: Vec<Mover>,
}

/// POST /movers - Create a new mover
async fn create_mover(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateMoverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::validation)?;

    let mover = state
        .store
        .create_mover(NewMover {
            name: req.name.trim().to_string(),
            weight_limit: req.weight_limit,
            energy: req.energy,
            quest_state: req.quest_state.unwrap_or_default(),
        })
        .await?;

    info!("Created mover '{}' (id: {})", mover.name, mover.id);

    Ok((
        StatusCode::CREATED,
        Json(MoverResponse {
            success: true,
            mover,
        }),
    ))
}

/// GET /movers - List movers, newest first by default
async fn list_movers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page(state.config.default_page_size, state.config.max_page_size)?;
    let (movers, total) = state.store.list_movers(page).await?;

    Ok(Json(MoverListResponse {
        success: true,
        total,
        limit: page.limit,
        offset: page.offset,
        movers,
    }))
}

/// GET /movers/:id - Get a mover with its held items
async fn get_mover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mover = state
        .store
        .get_mover_with_items(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Entity::Mover, id))?;

    Ok(Json(LoadedMoverResponse {
        success: true,
        mover,
    }))
}

/// PUT /movers/:id - Update a mover
async fn update_mover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateMoverRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::validation)?;

    let mover = state
        .store
        .update_mover(
            id,
            MoverPatch {
                name: req.name.map(|name| name.trim().to_string()),
                weight_limit: req.weight_limit,
                energy: req.energy,
                quest_state: req.quest_state,
            },
        )
        .await?;

    Ok(Json(MoverResponse {
        success: true,
        mover,
    }))
}

/// POST /movers/:id/load - Attach items to a mover
async fn load_mover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<LoadItemsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::validation)?;

    let mover = quest::load_items(state.store.as_ref(), id, &req.item_ids).await?;

    Ok(Json(LoadedMoverResponse {
        success: true,
        mover,
    }))
}

/// POST /movers/:id/start-mission
async fn start_mission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mover = quest::start_mission(state.store.as_ref(), id).await?;

    Ok(Json(MoverResponse {
        success: true,
        mover,
    }))
}

/// POST /movers/:id/end-mission
async fn end_mission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mover = quest::end_mission(state.store.as_ref(), id).await?;

    Ok(Json(MoverResponse {
        success: true,
        mover,
    }))
}

/// GET /movers/top - Movers ranked by missions completed
async fn top_movers(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let movers = quest::top_movers(state.store.as_ref(), state.config.top_movers_limit).await?;

    Ok(Json(TopMoversResponse {
        success: true,
        movers,
    }))
}

// ============================================================================
// HTTP Handlers - Items
// ============================================================================

#[derive(Serialize)]
struct ItemResponse {
    success: bool,
    item: Item,
}

#[derive(Serialize)]
struct ItemListResponse {
    success: bool,
    total: u64,
    limit: u32,
    offset: u32,
    items: Vec<Item>,
}

#[derive(Serialize)]
struct DeleteItemResponse {
    success: bool,
    message: &'static str,
}

/// POST /items - Create a new item
async fn create_item(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::validation)?;

    let item = state
        .store
        .create_item(NewItem {
            name: req.name.trim().to_string(),
            weight: req.weight,
        })
        .await?;

    info!("Created item '{}' (id: {})", item.name, item.id);

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse {
            success: true,
            item,
        }),
    ))
}

/// GET /items - List items, newest first by default
async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page(state.config.default_page_size, state.config.max_page_size)?;
    let (items, total) = state.store.list_items(page).await?;

    Ok(Json(ItemListResponse {
        success: true,
        total,
        limit: page.limit,
        offset: page.offset,
        items,
    }))
}

/// GET /items/:id
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .store
        .get_item(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Entity::Item, id))?;

    Ok(Json(ItemResponse {
        success: true,
        item,
    }))
}

/// PUT /items/:id - Update an item
async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::validation)?;

    let item = state
        .store
        .update_item(
            id,
            ItemPatch {
                name: req.name.map(|name| name.trim().to_string()),
                weight: req.weight,
            },
        )
        .await?;

    Ok(Json(ItemResponse {
        success: true,
        item,
    }))
}

/// DELETE /items/:id
async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete_item(id).await? {
        return Err(ApiError::not_found(Entity::Item, id));
    }

    info!("Deleted item {}", id);

    Ok(Json(DeleteItemResponse {
        success: true,
        message: "Item deleted successfully",
    }))
}

// ============================================================================
// Router
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Movers
        .route("/movers", post(create_mover).get(list_movers))
        .route("/movers/top", get(top_movers))
        .route("/movers/:id", get(get_mover).put(update_mover))
        .route("/movers/:id/load", post(load_mover))
        .route("/movers/:id/start-mission", post(start_mission))
        .route("/movers/:id/end-mission", post(end_mission))
        // Items
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .layer(TraceLayer::new_for_http())
        // In development, you may want CorsLayer::permissive()
        // For production, specify allowed origins explicitly
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transporter_server=info".parse().unwrap()),
        )
        .init();

    let config = ServerConfig::load().expect("Failed to load configuration");

    let store = SqliteStore::connect(&config.database_url)
        .await
        .expect("Failed to initialize database");

    let addr: SocketAddr = config.bind_addr.parse().expect("Invalid bind address");

    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config),
    };
    let app = router(state);

    info!("Transporter server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

// ============================================================================
// Tests
// ============================================================================
