use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    bom::{self, BomLine, FulfillmentReport, ItemFulfillment},
    entities::{bom_item, part},
    errors::ServiceError,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBomItemRequest {
    pub part_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub subsystem: String,
    #[validate(range(min = 0, message = "Quantity needed cannot be negative"))]
    pub quantity_needed: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBomItemRequest {
    pub part_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub subsystem: Option<String>,
    #[validate(range(min = 0))]
    pub quantity_needed: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BomStatusQuery {
    /// Restrict the report to one subsystem
    pub subsystem: Option<String>,
}

/// Item fulfillment with the part's display name. `part_name` is `None` for deleted parts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BomItemStatus {
    #[serde(flatten)]
    pub fulfillment: ItemFulfillment,
    pub part_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BomStatusResponse {
    #[serde(flatten)]
    pub report: FulfillmentReport,
    pub part_names: HashMap<Uuid, String>,
}

#[derive(Clone)]
pub struct BomService {
    db: Arc<DatabaseConnection>,
}

impl BomService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self, team_id: Uuid) -> Result<Vec<bom_item::Model>, ServiceError> {
        bom_item::Entity::find()
            .filter(bom_item::Column::TeamId.eq(team_id))
            .order_by_asc(bom_item::Column::Subsystem)
            .order_by_asc(bom_item::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, request), fields(subsystem = %request.subsystem))]
    pub async fn create_item(
        &self,
        team_id: Uuid,
        request: CreateBomItemRequest,
    ) -> Result<bom_item::Model, ServiceError> {
        request.validate()?;
        self.ensure_team_part(team_id, request.part_id).await?;

        let now = Utc::now();
        let created = bom_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            part_id: Set(request.part_id),
            subsystem: Set(request.subsystem.trim().to_string()),
            quantity_needed: Set(request.quantity_needed),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(bom_item_id = %created.id, team_id = %team_id, "BOM item created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<bom_item::Model, ServiceError> {
        bom_item::Entity::find_by_id(item_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("BOM item {item_id} not found")))
    }

    #[instrument(skip(self, request))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        request: UpdateBomItemRequest,
    ) -> Result<bom_item::Model, ServiceError> {
        request.validate()?;
        let current = self.get_item(item_id).await?;
        if let Some(part_id) = request.part_id {
            self.ensure_team_part(current.team_id, part_id).await?;
        }

        let mut active: bom_item::ActiveModel = current.into();
        if let Some(part_id) = request.part_id {
            active.part_id = Set(part_id);
        }
        if let Some(subsystem) = request.subsystem {
            active.subsystem = Set(subsystem.trim().to_string());
        }
        if let Some(quantity) = request.quantity_needed {
            active.quantity_needed = Set(quantity);
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());

        active.update(&*self.db).await.map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<(), ServiceError> {
        let result = bom_item::Entity::delete_by_id(item_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("BOM item {item_id} not found")));
        }
        info!(bom_item_id = %item_id, "BOM item deleted");
        Ok(())
    }

    /// Fulfillment report for a team, optionally for one subsystem.
    #[instrument(skip(self))]
    pub async fn status(
        &self,
        team_id: Uuid,
        subsystem: Option<&str>,
    ) -> Result<BomStatusResponse, ServiceError> {
        let mut select = bom_item::Entity::find().filter(bom_item::Column::TeamId.eq(team_id));
        if let Some(name) = subsystem.map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(bom_item::Column::Subsystem.eq(name));
        }
        let items = select
            .order_by_asc(bom_item::Column::Subsystem)
            .order_by_asc(bom_item::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let parts = self.load_parts(&items).await?;
        let on_hand: HashMap<Uuid, i32> = parts.iter().map(|(id, p)| (*id, p.quantity)).collect();
        let lines: Vec<BomLine> = items.iter().map(to_line).collect();

        Ok(BomStatusResponse {
            report: bom::calculate(&lines, &on_hand),
            part_names: parts.into_iter().map(|(id, p)| (id, p.name)).collect(),
        })
    }

    /// Items short on stock, largest shortfall first.
    #[instrument(skip(self))]
    pub async fn shortages(&self, team_id: Uuid) -> Result<Vec<BomItemStatus>, ServiceError> {
        let status = self.status(team_id, None).await?;
        Ok(bom::shortages(&status.report.items)
            .into_iter()
            .map(|fulfillment| BomItemStatus {
                part_name: status.part_names.get(&fulfillment.part_id).cloned(),
                fulfillment,
            })
            .collect())
    }

    /// All referenced parts in one `IN` query. Deleted parts are simply absent.
    async fn load_parts(
        &self,
        items: &[bom_item::Model],
    ) -> Result<HashMap<Uuid, part::Model>, ServiceError> {
        let mut ids: Vec<Uuid> = items.iter().map(|i| i.part_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let parts = part::Entity::find()
            .filter(part::Column::Id.is_in(ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(parts.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn ensure_team_part(&self, team_id: Uuid, part_id: Uuid) -> Result<(), ServiceError> {
        let found = part::Entity::find_by_id(part_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        match found {
            Some(p) if p.team_id == team_id => Ok(()),
            _ => Err(ServiceError::InvalidInput(format!(
                "Part {part_id} does not belong to this team"
            ))),
        }
    }
}

fn to_line(item: &bom_item::Model) -> BomLine {
    BomLine {
        item_id: item.id,
        part_id: item.part_id,
        subsystem: item.subsystem.clone(),
        quantity_needed: item.quantity_needed,
    }
}
