use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::part::{self, is_low_stock},
    errors::ServiceError,
    services::{money, vendors::VendorService},
};

/// Outcome of applying a signed delta to an on-hand quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuantityAdjustment {
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub low_stock: bool,
}

/// Applies `delta` to `current`, refusing any result below zero.
pub fn apply_adjustment(
    current: i32,
    delta: i32,
    reorder_point: i32,
) -> Result<QuantityAdjustment, ServiceError> {
    let new_quantity = current
        .checked_add(delta)
        .ok_or_else(|| ServiceError::InvalidInput(format!("Adjustment {delta} is out of range")))?;

    if new_quantity < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "cannot apply {delta:+} to a quantity of {current}"
        )));
    }

    Ok(QuantityAdjustment {
        previous_quantity: current,
        new_quantity,
        low_stock: is_low_stock(new_quantity, reorder_point),
    })
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub part_number: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "Reorder point cannot be negative"))]
    pub reorder_point: i32,
    pub vendor_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
}

/// Quantity is not editable here; use an adjustment.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePartRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub part_number: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(range(min = 0))]
    pub reorder_point: Option<i32>,
    pub vendor_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdjustQuantityRequest {
    pub delta: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PartQuery {
    /// Matches name, part number or category
    pub search: Option<String>,
    /// Only parts at or below their reorder point
    pub low_stock: Option<bool>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartResponse {
    #[serde(flatten)]
    pub part: part::Model,
    pub low_stock: bool,
}

impl From<part::Model> for PartResponse {
    fn from(part: part::Model) -> Self {
        let low_stock = part.is_low_stock();
        Self { part, low_stock }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartPage {
    pub items: Vec<PartResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdjustmentResponse {
    pub part_id: Uuid,
    #[serde(flatten)]
    pub adjustment: QuantityAdjustment,
    pub reason: Option<String>,
}

/// Totals used by the assistant's context
#[derive(Debug, Clone, Serialize)]
pub struct InventorySummary {
    pub part_count: usize,
    pub total_units: i64,
    /// Lowest-stocked first
    pub low_stock: Vec<part::Model>,
}

#[derive(Clone)]
pub struct PartService {
    db: Arc<DatabaseConnection>,
    vendors: Arc<VendorService>,
}

impl PartService {
    pub fn new(db: Arc<DatabaseConnection>, vendors: Arc<VendorService>) -> Self {
        Self { db, vendors }
    }

    #[instrument(skip(self))]
    pub async fn list_parts(&self, team_id: Uuid, query: PartQuery) -> Result<PartPage, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(50).clamp(1, 200);

        let mut select = part::Entity::find().filter(part::Column::TeamId.eq(team_id));
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(part::Column::Name.contains(search))
                    .add(part::Column::PartNumber.contains(search))
                    .add(part::Column::Category.contains(search)),
            );
        }
        if query.low_stock == Some(true) {
            select = select.filter(Expr::col(part::Column::Quantity).lte(Expr::col(part::Column::ReorderPoint)));
        }

        let paginator = select.order_by_asc(part::Column::Name).paginate(&*self.db, per_page);
        let total = paginator.num_items().await.map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(PartResponse::from)
            .collect();

        Ok(PartPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Low-stock parts, emptiest first.
    #[instrument(skip(self))]
    pub async fn low_stock(&self, team_id: Uuid) -> Result<Vec<part::Model>, ServiceError> {
        part::Entity::find()
            .filter(part::Column::TeamId.eq(team_id))
            .filter(Expr::col(part::Column::Quantity).lte(Expr::col(part::Column::ReorderPoint)))
            .order_by_asc(part::Column::Quantity)
            .order_by_asc(part::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_part(
        &self,
        team_id: Uuid,
        request: CreatePartRequest,
    ) -> Result<part::Model, ServiceError> {
        request.validate()?;
        if let Some(vendor_id) = request.vendor_id {
            self.vendors.get_visible(vendor_id, team_id).await?;
        }
        check_price(request.unit_price)?;

        let now = Utc::now();
        let created = part::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            name: Set(request.name.trim().to_string()),
            part_number: Set(request.part_number),
            category: Set(request.category),
            description: Set(request.description),
            location: Set(request.location),
            quantity: Set(request.quantity),
            reorder_point: Set(request.reorder_point),
            vendor_id: Set(request.vendor_id),
            unit_price: Set(request.unit_price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(part_id = %created.id, team_id = %team_id, "Part created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_part(&self, part_id: Uuid) -> Result<part::Model, ServiceError> {
        part::Entity::find_by_id(part_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {part_id} not found")))
    }

    #[instrument(skip(self, request))]
    pub async fn update_part(
        &self,
        part_id: Uuid,
        request: UpdatePartRequest,
    ) -> Result<part::Model, ServiceError> {
        request.validate()?;
        check_price(request.unit_price)?;
        let current = self.get_part(part_id).await?;
        if let Some(vendor_id) = request.vendor_id {
            self.vendors.get_visible(vendor_id, current.team_id).await?;
        }

        let mut active: part::ActiveModel = current.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(v) = request.part_number {
            active.part_number = Set(Some(v));
        }
        if let Some(v) = request.category {
            active.category = Set(Some(v));
        }
        if let Some(v) = request.description {
            active.description = Set(Some(v));
        }
        if let Some(v) = request.location {
            active.location = Set(Some(v));
        }
        if let Some(v) = request.reorder_point {
            active.reorder_point = Set(v);
        }
        if let Some(v) = request.vendor_id {
            active.vendor_id = Set(Some(v));
        }
        if let Some(v) = request.unit_price {
            active.unit_price = Set(Some(v));
        }
        active.updated_at = Set(Utc::now());

        active.update(&*self.db).await.map_err(ServiceError::DatabaseError)
    }

    /// Applies a signed quantity change inside one transaction.
    #[instrument(skip(self, request), fields(delta = request.delta))]
    pub async fn adjust_quantity(
        &self,
        part_id: Uuid,
        request: AdjustQuantityRequest,
    ) -> Result<AdjustmentResponse, ServiceError> {
        request.validate()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, part_id = %part_id, "Failed to start transaction for adjustment");
            ServiceError::DatabaseError(e)
        })?;

        let (_, adjustment) = add_to_quantity(&txn, part_id, request.delta)
            .await
            .map_err(|e| {
                warn!(part_id = %part_id, delta = request.delta, error = %e, "Rejected adjustment");
                e
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {part_id} not found")))?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, part_id = %part_id, "Failed to commit adjustment");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            part_id = %part_id,
            previous = adjustment.previous_quantity,
            new = adjustment.new_quantity,
            low_stock = adjustment.low_stock,
            reason = request.reason.as_deref().unwrap_or(""),
            "Inventory adjusted"
        );

        Ok(AdjustmentResponse {
            part_id,
            adjustment,
            reason: request.reason,
        })
    }

    /// Counts, unit total and up to `low_stock_limit` low-stock parts.
    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        team_id: Uuid,
        low_stock_limit: usize,
    ) -> Result<InventorySummary, ServiceError> {
        let parts = part::Entity::find()
            .filter(part::Column::TeamId.eq(team_id))
            .order_by_asc(part::Column::Quantity)
            .order_by_asc(part::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let total_units = parts.iter().map(|p| i64::from(p.quantity)).sum();
        let part_count = parts.len();
        let low_stock = parts
            .into_iter()
            .filter(|p| p.is_low_stock())
            .take(low_stock_limit)
            .collect();

        Ok(InventorySummary {
            part_count,
            total_units,
            low_stock,
        })
    }
}

fn check_price(price: Option<Decimal>) -> Result<(), ServiceError> {
    match price {
        Some(p) => money::check_price("unit_price", p),
        None => Ok(()),
    }
}

/// Adds `delta` to a part's quantity with one conditional UPDATE, so concurrent
/// adjustments serialize on the row. `Ok(None)` means the part does not exist.
pub(crate) async fn add_to_quantity<C: ConnectionTrait>(
    conn: &C,
    part_id: Uuid,
    delta: i32,
) -> Result<Option<(part::Model, QuantityAdjustment)>, ServiceError> {
    let floor = -i64::from(delta);
    let ceiling = i64::from(i32::MAX) - i64::from(delta);
    let result = part::Entity::update_many()
        .col_expr(part::Column::Quantity, Expr::col(part::Column::Quantity).add(delta))
        .col_expr(part::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(part::Column::Id.eq(part_id))
        .filter(part::Column::Quantity.gte(floor))
        .filter(part::Column::Quantity.lte(ceiling))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let Some(current) = part::Entity::find_by_id(part_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?
    else {
        return Ok(None);
    };

    if result.rows_affected == 0 {
        // Nothing written: report why against the stored quantity.
        apply_adjustment(current.quantity, delta, current.reorder_point)?;
        return Err(ServiceError::Conflict(format!(
            "Part {part_id} changed during the adjustment"
        )));
    }

    let adjustment = apply_adjustment(current.quantity - delta, delta, current.reorder_point)?;
    Ok(Some((current, adjustment)))
}

/// Adds `quantity` to a part inside an open transaction. Missing parts are skipped.
pub(crate) async fn restock_part<C: ConnectionTrait>(
    conn: &C,
    part_id: Uuid,
    quantity: i32,
) -> Result<Option<part::Model>, ServiceError> {
    let restocked = add_to_quantity(conn, part_id, quantity).await?;
    if restocked.is_none() {
        warn!(part_id = %part_id, "Received line references a removed part");
    }
    Ok(restocked.map(|(part, _)| part))
}
