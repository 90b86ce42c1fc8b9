use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{entities::vendor, errors::ServiceError};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateVendorRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(range(min = 0, max = 365))]
    pub lead_time_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateVendorRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(range(min = 0, max = 365))]
    pub lead_time_days: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct VendorService {
    db: Arc<DatabaseConnection>,
}

impl VendorService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Global vendors plus the team's own, alphabetically.
    #[instrument(skip(self))]
    pub async fn list_for_team(&self, team_id: Uuid) -> Result<Vec<vendor::Model>, ServiceError> {
        vendor::Entity::find()
            .filter(
                Condition::any()
                    .add(vendor::Column::TeamId.is_null())
                    .add(vendor::Column::TeamId.eq(team_id)),
            )
            .order_by_asc(vendor::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Creates a vendor scoped to `team_id`, or a global one when `None`.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_vendor(
        &self,
        team_id: Option<Uuid>,
        request: CreateVendorRequest,
    ) -> Result<vendor::Model, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let created = vendor::ActiveModel {
            id: Set(Uuid::new_v4()),
            team_id: Set(team_id),
            name: Set(request.name.trim().to_string()),
            website: Set(request.website),
            contact_email: Set(request.contact_email),
            lead_time_days: Set(request.lead_time_days),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

        info!(vendor_id = %created.id, global = team_id.is_none(), "Vendor created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_vendor(&self, vendor_id: Uuid) -> Result<vendor::Model, ServiceError> {
        vendor::Entity::find_by_id(vendor_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {vendor_id} not found")))
    }

    /// Loads a vendor and checks that `team_id` may use it.
    pub async fn get_visible(
        &self,
        vendor_id: Uuid,
        team_id: Uuid,
    ) -> Result<vendor::Model, ServiceError> {
        let found = self.get_vendor(vendor_id).await.map_err(|e| match e {
            ServiceError::NotFound(msg) => ServiceError::InvalidInput(msg),
            other => other,
        })?;
        match found.team_id {
            None => Ok(found),
            Some(owner) if owner == team_id => Ok(found),
            Some(_) => Err(ServiceError::InvalidInput(format!(
                "Vendor {vendor_id} belongs to another team"
            ))),
        }
    }

    #[instrument(skip(self, request))]
    pub async fn update_vendor(
        &self,
        vendor_id: Uuid,
        request: UpdateVendorRequest,
    ) -> Result<vendor::Model, ServiceError> {
        request.validate()?;
        let current = self.get_vendor(vendor_id).await?;

        let mut active: vendor::ActiveModel = current.into();
        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(website) = request.website {
            active.website = Set(Some(website));
        }
        if let Some(email) = request.contact_email {
            active.contact_email = Set(Some(email));
        }
        if let Some(days) = request.lead_time_days {
            active.lead_time_days = Set(Some(days));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await.map_err(ServiceError::DatabaseError)?;
        info!(vendor_id = %vendor_id, "Vendor updated");
        Ok(updated)
    }

    /// Names for a batch of vendor ids, in one query.
    pub async fn names_for(
        &self,
        vendor_ids: Vec<Uuid>,
    ) -> Result<std::collections::HashMap<Uuid, String>, ServiceError> {
        if vendor_ids.is_empty() {
            return Ok(Default::default());
        }
        let rows = vendor::Entity::find()
            .filter(vendor::Column::Id.is_in(vendor_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(rows.into_iter().map(|v| (v.id, v.name)).collect())
    }
}
