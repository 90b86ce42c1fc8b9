use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "parts")]
#[schema(as = Part)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub part_number: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    /// Bin or shelf where the part is kept
    pub location: Option<String>,
    pub quantity: i32,
    pub reorder_point: i32,
    pub vendor_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.quantity, self.reorder_point)
    }
}

/// A part is low on stock once it is at or below its reorder point.
pub fn is_low_stock(quantity: i32, reorder_point: i32) -> bool {
    quantity <= reorder_point
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::team::Entity",
        from = "Column::TeamId",
        to = "super::team::Column::Id",
        on_delete = "Cascade"
    )]
    Team,
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id",
        on_delete = "SetNull"
    )]
    Vendor,
}

impl Related<super::team::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Team.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_stock_is_inclusive_of_reorder_point() {
        assert!(is_low_stock(5, 5));
        assert!(!is_low_stock(6, 5));
        assert!(is_low_stock(0, 0));
    }
}
