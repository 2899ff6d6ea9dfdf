//! Reference data used by the ledger: banks, locations, card types, plus the
//! user and report records the dashboard reads.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::InMemoryCache;
use crate::entities::{bank, card_type, location, report, stock, user};
use crate::errors::ServiceError;
use crate::services::DASHBOARD_CACHE_PATTERN;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBankRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub bank_code: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub bank_id: Uuid,
    #[validate(range(min = 0))]
    pub max_capacity: Option<i64>,
    #[validate(length(max = 64))]
    pub security_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardTypeRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub sub_type: Option<String>,
    #[validate(length(max = 255))]
    pub sub_sub_type: Option<String>,
    pub bank_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 64))]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 64))]
    pub report_type: String,
    pub generated_by: Option<Uuid>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    cache: Arc<InMemoryCache>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, cache: Arc<InMemoryCache>) -> Self {
        Self { db, cache }
    }

    #[instrument(skip(self, request), fields(bank_code = %request.bank_code))]
    pub async fn create_bank(&self, request: CreateBankRequest) -> Result<bank::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db;

        let taken = bank::Entity::find()
            .filter(bank::Column::BankCode.eq(request.bank_code.clone()))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "bank code {} already exists",
                request.bank_code
            )));
        }

        let created = bank::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            address: Set(request.address),
            bank_code: Set(request.bank_code),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(bank_id = %created.id, "bank created");
        Ok(created)
    }

    pub async fn list_banks(&self) -> Result<Vec<bank::Model>, ServiceError> {
        Ok(bank::Entity::find()
            .order_by_asc(bank::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_bank(&self, id: Uuid) -> Result<bank::Model, ServiceError> {
        bank::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Bank", id))
    }

    #[instrument(skip(self, request), fields(bank_id = %request.bank_id))]
    pub async fn create_location(
        &self,
        request: CreateLocationRequest,
    ) -> Result<location::Model, ServiceError> {
        request.validate()?;
        self.get_bank(request.bank_id).await?;

        let created = location::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            address: Set(request.address),
            bank_id: Set(request.bank_id),
            max_capacity: Set(request.max_capacity),
            security_level: Set(request.security_level),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(location_id = %created.id, "location created");
        Ok(created)
    }

    pub async fn list_locations(&self) -> Result<Vec<location::Model>, ServiceError> {
        Ok(location::Entity::find()
            .order_by_asc(location::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Refused while the location still holds cards. Zero-quantity stock
    /// rows go with it. Rows with a quantity are never deleted here: the
    /// `stocks` foreign key restricts the location delete, so a row that
    /// appears after the check blocks it.
    #[instrument(skip(self))]
    pub async fn delete_location(&self, id: Uuid) -> Result<(), ServiceError> {
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    location::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Location", id))?;

                    stock::Entity::delete_many()
                        .filter(stock::Column::LocationId.eq(id))
                        .filter(stock::Column::Quantity.eq(0))
                        .exec(txn)
                        .await?;

                    let stocked = stock::Entity::find()
                        .filter(stock::Column::LocationId.eq(id))
                        .count(txn)
                        .await?;
                    if stocked > 0 {
                        return Err(ServiceError::InvalidOperation(format!(
                            "location {} still holds stock for {} card type(s)",
                            id, stocked
                        )));
                    }

                    location::Entity::delete_by_id(id)
                        .exec(txn)
                        .await
                        .map_err(|e| location_delete_error(id, e))?;
                    Ok(())
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(location_id = %id, "location deleted");
        Ok(())
    }

    #[instrument(skip(self, request))]
    pub async fn create_card_type(
        &self,
        request: CreateCardTypeRequest,
    ) -> Result<card_type::Model, ServiceError> {
        request.validate()?;
        if let Some(bank_id) = request.bank_id {
            self.get_bank(bank_id).await?;
        }

        let created = card_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            sub_type: Set(request.sub_type),
            sub_sub_type: Set(request.sub_sub_type),
            bank_id: Set(request.bank_id),
            description: Set(request.description),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(card_type_id = %created.id, label = %created.label(), "card type created");
        Ok(created)
    }

    pub async fn list_card_types(&self) -> Result<Vec<card_type::Model>, ServiceError> {
        Ok(card_type::Entity::find()
            .order_by_asc(card_type::Column::Name)
            .order_by_asc(card_type::Column::SubType)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db;
        let email = request.email.trim().to_lowercase();

        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(db)
            .await?;
        if taken.is_some() {
            return Err(ServiceError::InvalidOperation(format!(
                "a user with email {} already exists",
                email
            )));
        }

        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            email: Set(email),
            role: Set(request.role),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(user_id = %created.id, "user created");
        Ok(created)
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_report(
        &self,
        request: CreateReportRequest,
    ) -> Result<report::Model, ServiceError> {
        request.validate()?;

        let created = report::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title),
            report_type: Set(request.report_type),
            generated_by: Set(request.generated_by),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(report_id = %created.id, "report recorded");
        Ok(created)
    }

    pub async fn list_reports(&self) -> Result<Vec<report::Model>, ServiceError> {
        Ok(report::Entity::find()
            .order_by_desc(report::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

fn location_delete_error(id: Uuid, err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            ServiceError::InvalidOperation(format!("location {} still holds stock", id))
        }
        _ => ServiceError::db_error(err),
    }
}
