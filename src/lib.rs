//! TeamHub API Library
//!
//! Backend for robotics competition teams: parts inventory, bill of materials,
//! purchase orders, vendors, membership and a Discord assistant.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod agent;
pub mod auth;
pub mod bom;
pub mod config;
pub mod db;
pub mod discord;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub agent: Arc<agent::Agent>,
    pub discord: Arc<discord::DiscordIntegration>,
}

impl AppState {
    /// Wires services, the assistant and the Discord integration from configuration.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
    ) -> Result<Self, errors::ServiceError> {
        let services = handlers::AppServices::new(db.clone(), &config);
        let agent = agent::Agent::from_config(&services, &config)?;
        let discord = discord::DiscordIntegration::from_config(&config)?;
        Ok(Self {
            db,
            config,
            services,
            agent: Arc::new(agent),
            discord: Arc::new(discord),
        })
    }
}

// Common response wrappers
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if total == 0 || limit == 0 {
            0
        } else {
            total.div_ceil(limit)
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{auth, bom, discord, members, orders, parts, teams, vendors};

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/me",
            get(auth::me).put(auth::update_me).delete(auth::delete_me),
        );

    let team_routes = Router::new()
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route("/teams/:id", get(teams::get_team).put(teams::update_team))
        .route(
            "/teams/:id/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/teams/:id/members/:user_id",
            put(members::update_member_role).delete(members::remove_member),
        );

    let vendor_routes = Router::new()
        .route(
            "/teams/:id/vendors",
            get(vendors::list_team_vendors).post(vendors::create_team_vendor),
        )
        .route("/vendors", post(vendors::create_global_vendor))
        .route("/vendors/:id", get(vendors::get_vendor).put(vendors::update_vendor));

    let part_routes = Router::new()
        .route(
            "/teams/:id/parts",
            get(parts::list_parts).post(parts::create_part),
        )
        .route("/teams/:id/parts/low-stock", get(parts::low_stock_parts))
        .route("/parts/:id", get(parts::get_part).put(parts::update_part))
        .route("/parts/:id/adjust", post(parts::adjust_part));

    let bom_routes = Router::new()
        .route(
            "/teams/:id/bom",
            get(bom::list_bom_items).post(bom::create_bom_item),
        )
        .route("/teams/:id/bom/status", get(bom::bom_status))
        .route("/teams/:id/bom/shortages", get(bom::bom_shortages))
        .route(
            "/bom/:id",
            put(bom::update_bom_item).delete(bom::delete_bom_item),
        );

    let order_routes = Router::new()
        .route(
            "/teams/:id/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route("/orders/:id", get(orders::get_order).put(orders::update_order))
        .route("/orders/:id/items", post(orders::add_order_item))
        .route("/orders/:id/items/:item_id", delete(orders::remove_order_item))
        .route("/orders/:id/status", put(orders::update_order_status));

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/discord/interactions", post(discord::interactions))
        .merge(auth_routes)
        .merge(team_routes)
        .merge(vendor_routes)
        .merge(part_routes)
        .merge(bom_routes)
        .merge(order_routes)
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "teamhub-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
        "assistant_configured": state.agent.is_configured(),
        "discord_configured": state.config.discord_enabled(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
