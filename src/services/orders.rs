use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item, part,
    },
    errors::ServiceError,
    services::{money, parts::restock_part, vendors::VendorService},
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub part_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub vendor_id: Uuid,
    #[validate(length(max = 100))]
    pub order_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(max = 100))]
    pub order_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Compact order line used by the assistant and the Discord `/orders` command
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub vendor: String,
    pub status: OrderStatus,
    pub order_number: Option<String>,
    pub total_amount: Decimal,
    pub item_count: usize,
}

/// Sum of line totals, bounded by what the total column can store.
pub fn order_total<'a>(
    items: impl IntoIterator<Item = &'a order_item::Model>,
) -> Result<Decimal, ServiceError> {
    let lines = items
        .into_iter()
        .map(|i| money::line_total(i.quantity, i.unit_price))
        .collect::<Result<Vec<_>, _>>()?;
    money::checked_sum(lines)
}

fn check_line(item: &OrderItemRequest) -> Result<(), ServiceError> {
    money::check_price("unit_price", item.unit_price)?;
    money::line_total(item.quantity, item.unit_price)?;
    Ok(())
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    vendors: Arc<VendorService>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, vendors: Arc<VendorService>) -> Self {
        Self { db, vendors }
    }

    /// Creates a draft order and its lines in one transaction.
    #[instrument(skip(self, request), fields(vendor_id = %request.vendor_id, items = request.items.len()))]
    pub async fn create_order(
        &self,
        team_id: Uuid,
        created_by: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;
        request.items.iter().try_for_each(check_line)?;
        self.vendors.get_visible(request.vendor_id, team_id).await?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let created = order::ActiveModel {
            id: Set(order_id),
            team_id: Set(team_id),
            vendor_id: Set(request.vendor_id),
            status: Set(OrderStatus::Draft),
            order_number: Set(request.order_number),
            notes: Set(request.notes),
            total_amount: Set(Decimal::ZERO),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in request.items {
            items.push(insert_line(&txn, team_id, order_id, line).await?);
        }

        let created = set_total(&txn, created, order_total(&items)?).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total = %created.total_amount, "Order created");
        Ok(OrderWithItems {
            order: created,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        team_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut select = order::Entity::find().filter(order::Column::TeamId.eq(team_id));
        if let Some(status) = status {
            select = select.filter(order::Column::Status.eq(status));
        }
        select
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))
    }

    #[instrument(skip(self))]
    pub async fn get_with_items(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = self.get_order(order_id).await?;
        let items = load_items(&*self.db, order_id).await?;
        Ok(OrderWithItems { order, items })
    }

    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        request.validate()?;
        let current = self.get_order(order_id).await?;

        let mut active: order::ActiveModel = current.into();
        if let Some(number) = request.order_number {
            active.order_number = Set(Some(number));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(ServiceError::DatabaseError)
    }

    /// Adds a line and recomputes the total. Only draft and pending orders accept changes.
    #[instrument(skip(self, request))]
    pub async fn add_item(
        &self,
        order_id: Uuid,
        request: OrderItemRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        request.validate()?;
        check_line(&request)?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        let current = find_editable(&txn, order_id).await?;
        insert_line(&txn, current.team_id, order_id, request).await?;

        let items = load_items(&txn, order_id).await?;
        let updated = set_total(&txn, current, order_total(&items)?).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, total = %updated.total_amount, "Order line added");
        Ok(OrderWithItems {
            order: updated,
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        let current = find_editable(&txn, order_id).await?;

        let result = order_item::Entity::delete_many()
            .filter(order_item::Column::Id.eq(item_id))
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Item {item_id} not found on order {order_id}"
            )));
        }

        let items = load_items(&txn, order_id).await?;
        let updated = set_total(&txn, current, order_total(&items)?).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, item_id = %item_id, "Order line removed");
        Ok(OrderWithItems {
            order: updated,
            items,
        })
    }

    /// Moves an order along its lifecycle. Receiving restocks linked parts in the same transaction.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for status change");
            ServiceError::DatabaseError(e)
        })?;

        let current = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let previous = current.status;
        if !previous.can_transition_to(next) {
            warn!(order_id = %order_id, from = %previous, to = %next, "Rejected status change");
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move order from {previous} to {next}"
            )));
        }

        if next == OrderStatus::Received {
            for line in load_items(&txn, order_id).await? {
                if let Some(part_id) = line.part_id {
                    restock_part(&txn, part_id, line.quantity).await?;
                }
            }
        }

        let mut active: order::ActiveModel = current.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status change");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, from = %previous, to = %next, "Order status changed");
        Ok(updated)
    }

    /// Orders with vendor names and line counts, newest first.
    ///
    /// With no status filter only open orders are returned.
    #[instrument(skip(self))]
    pub async fn summaries(
        &self,
        team_id: Uuid,
        status: Option<OrderStatus>,
        limit: usize,
    ) -> Result<Vec<OrderSummary>, ServiceError> {
        let orders: Vec<order::Model> = self
            .list_orders(team_id, status)
            .await?
            .into_iter()
            .filter(|o| status.is_some() || o.status.is_open())
            .take(limit)
            .collect();
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let names = self
            .vendors
            .names_for(orders.iter().map(|o| o.vendor_id).collect())
            .await?;

        Ok(orders
            .into_iter()
            .map(|o| OrderSummary {
                id: o.id,
                vendor: names
                    .get(&o.vendor_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown vendor".to_string()),
                status: o.status,
                order_number: o.order_number,
                total_amount: o.total_amount,
                item_count: items.iter().filter(|i| i.order_id == o.id).count(),
            })
            .collect())
    }
}

async fn find_editable<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<order::Model, ServiceError> {
    let current = order::Entity::find_by_id(order_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
    if !current.status.items_editable() {
        return Err(ServiceError::InvalidStatus(format!(
            "Items cannot change once an order is {}",
            current.status
        )));
    }
    Ok(current)
}

async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<order_item::Model>, ServiceError> {
    order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::DatabaseError)
}

async fn insert_line<C: ConnectionTrait>(
    conn: &C,
    team_id: Uuid,
    order_id: Uuid,
    line: OrderItemRequest,
) -> Result<order_item::Model, ServiceError> {
    if let Some(part_id) = line.part_id {
        let owned = part::Entity::find_by_id(part_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .is_some_and(|p| p.team_id == team_id);
        if !owned {
            return Err(ServiceError::InvalidInput(format!(
                "Part {part_id} does not belong to this team"
            )));
        }
    }

    order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        part_id: Set(line.part_id),
        description: Set(line.description.trim().to_string()),
        quantity: Set(line.quantity),
        unit_price: Set(line.unit_price),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::DatabaseError)
}

async fn set_total<C: ConnectionTrait>(
    conn: &C,
    current: order::Model,
    total: Decimal,
) -> Result<order::Model, ServiceError> {
    let mut active: order::ActiveModel = current.into();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(ServiceError::DatabaseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, cents: i64) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            part_id: None,
            description: "goBILDA 5203 motor".into(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_is_sum_of_line_totals() {
        let items = vec![line(2, 3999), line(10, 125)];
        assert_eq!(order_total(&items).unwrap(), Decimal::new(9248, 2));
    }

    #[test]
    fn empty_order_totals_zero() {
        assert_eq!(order_total(&Vec::new()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn total_past_the_column_limit_is_a_validation_error() {
        let items = vec![line(1, 999_999_999_999), line(1, 1)];
        assert!(matches!(order_total(&items), Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn negative_unit_price_rejected() {
        let request = OrderItemRequest {
            part_id: None,
            description: "Refund".into(),
            quantity: 1,
            unit_price: Decimal::new(-500, 2),
        };
        assert!(check_line(&request).is_err());
    }

    #[test]
    fn oversized_unit_price_rejected() {
        let request = OrderItemRequest {
            part_id: None,
            description: "Field elements".into(),
            quantity: 2,
            unit_price: Decimal::MAX,
        };
        assert!(matches!(check_line(&request), Err(ServiceError::ValidationError(_))));
    }
}
