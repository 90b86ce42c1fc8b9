pub mod auth;
pub mod bom;
pub mod common;
pub mod discord;
pub mod members;
pub mod orders;
pub mod parts;
pub mod teams;
pub mod vendors;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    auth::AuthService,
    config::AppConfig,
    services::{
        bom::BomService, conversations::ConversationService, members::MemberService,
        orders::OrderService, parts::PartService, teams::TeamService, vendors::VendorService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<AuthService>,
    pub teams: Arc<TeamService>,
    pub members: Arc<MemberService>,
    pub vendors: Arc<VendorService>,
    pub parts: Arc<PartService>,
    pub bom: Arc<BomService>,
    pub orders: Arc<OrderService>,
    pub conversations: Arc<ConversationService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        let vendors = Arc::new(VendorService::new(db.clone()));
        Self {
            auth: Arc::new(AuthService::new(db.clone(), config.session_ttl_secs)),
            teams: Arc::new(TeamService::new(db.clone())),
            members: Arc::new(MemberService::new(db.clone())),
            parts: Arc::new(PartService::new(db.clone(), vendors.clone())),
            bom: Arc::new(BomService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), vendors.clone())),
            conversations: Arc::new(ConversationService::new(
                db,
                config.conversation_history_limit,
            )),
            vendors,
        }
    }
}
