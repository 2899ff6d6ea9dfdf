//! Stock counters per (location, card type).
//!
//! Quantities are only ever changed through [`increment_or_create`] and
//! [`decrement_if_sufficient`], both single SQL statements evaluated by the
//! database. Callers never read a quantity, compare it and write it back.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::cache::InMemoryCache;
use crate::entities::{card_type, location, stock};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::invariants::{check_sufficient_stock, crosses_alert_threshold};
use crate::services::DASHBOARD_CACHE_PATTERN;

/// Result of one atomic stock change.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub stock: stock::Model,
    pub before: i64,
}

impl StockChange {
    /// Low-stock event when this change crossed the row's alert threshold.
    pub fn low_stock_event(&self) -> Option<Event> {
        let row = &self.stock;
        crosses_alert_threshold(self.before, row.quantity, row.alert_threshold).then(|| {
            Event::LowStockDetected {
                stock_id: row.id,
                location_id: row.location_id,
                card_type_id: row.card_type_id,
                quantity: row.quantity,
                alert_threshold: row.alert_threshold,
            }
        })
    }
}

pub async fn find_stock<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
) -> Result<Option<stock::Model>, ServiceError> {
    Ok(stock::Entity::find()
        .filter(stock::Column::LocationId.eq(location_id))
        .filter(stock::Column::CardTypeId.eq(card_type_id))
        .one(conn)
        .await?)
}

async fn require_stock<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
) -> Result<stock::Model, ServiceError> {
    find_stock(conn, location_id, card_type_id)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!(
                "stock row for location {} / card type {} vanished inside transaction",
                location_id, card_type_id
            ))
        })
}

/// Adds `amount` to the counter, creating it at zero first when missing.
///
/// The update only matches while the sum still fits in an `i64`; a counter
/// that would overflow is left untouched and reported as `InvalidOperation`.
pub async fn increment_or_create<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
    amount: i64,
) -> Result<StockChange, ServiceError> {
    let now = Utc::now();
    let row = stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        location_id: Set(location_id),
        card_type_id: Set(card_type_id),
        quantity: Set(0),
        alert_threshold: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    stock::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([stock::Column::LocationId, stock::Column::CardTypeId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    let result = stock::Entity::update_many()
        .col_expr(
            stock::Column::Quantity,
            Expr::col(stock::Column::Quantity).add(amount),
        )
        .col_expr(stock::Column::UpdatedAt, Expr::value(now))
        .filter(stock::Column::LocationId.eq(location_id))
        .filter(stock::Column::CardTypeId.eq(card_type_id))
        .filter(stock::Column::Quantity.lte(i64::MAX.saturating_sub(amount)))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        if let Some(current) = find_stock(conn, location_id, card_type_id).await? {
            return Err(ServiceError::InvalidOperation(format!(
                "adding {} to stock of card type {} at location {} (currently {}) exceeds the maximum quantity",
                amount, card_type_id, location_id, current.quantity
            )));
        }
    }
    if result.rows_affected != 1 {
        return Err(ServiceError::InternalError(format!(
            "increment touched {} stock rows",
            result.rows_affected
        )));
    }

    let stock = require_stock(conn, location_id, card_type_id).await?;
    debug!(%location_id, %card_type_id, amount, quantity = stock.quantity, "stock incremented");
    Ok(StockChange {
        before: stock.quantity - amount,
        stock,
    })
}

/// Subtracts `amount` only when the counter holds at least `amount`.
///
/// The comparison happens in the `UPDATE ... WHERE quantity >= amount`
/// itself; zero affected rows means the stock was insufficient (or the row
/// does not exist) and the current value is read back for the error.
pub async fn decrement_if_sufficient<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
    amount: i64,
) -> Result<StockChange, ServiceError> {
    let result = stock::Entity::update_many()
        .col_expr(
            stock::Column::Quantity,
            Expr::col(stock::Column::Quantity).sub(amount),
        )
        .col_expr(stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(stock::Column::LocationId.eq(location_id))
        .filter(stock::Column::CardTypeId.eq(card_type_id))
        .filter(stock::Column::Quantity.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let available = find_stock(conn, location_id, card_type_id)
            .await?
            .map(|s| s.quantity);
        check_sufficient_stock(card_type_id, location_id, available, amount)?;
        // The row was sufficient on re-read, which only happens when the
        // statement matched nothing for another reason.
        return Err(ServiceError::InternalError(format!(
            "conditional decrement matched no row for location {} / card type {}",
            location_id, card_type_id
        )));
    }

    let stock = require_stock(conn, location_id, card_type_id).await?;
    debug!(%location_id, %card_type_id, amount, quantity = stock.quantity, "stock decremented");
    Ok(StockChange {
        before: stock.quantity + amount,
        stock,
    })
}

/// Applies a signed change: positive increments, negative decrements if
/// sufficient, zero does nothing.
pub async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
    delta: i64,
) -> Result<Option<StockChange>, ServiceError> {
    match delta {
        0 => Ok(None),
        d if d > 0 => increment_or_create(conn, location_id, card_type_id, d)
            .await
            .map(Some),
        d => decrement_if_sufficient(conn, location_id, card_type_id, -d)
            .await
            .map(Some),
    }
}

/// Stock row with its location and card type joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    #[serde(flatten)]
    pub stock: stock::Model,
    pub location: Option<location::Model>,
    pub card_type: Option<card_type::Model>,
    pub is_critical: bool,
}

/// Joins locations and card types onto stock rows with two lookups.
pub async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<stock::Model>,
) -> Result<Vec<StockView>, ServiceError> {
    let location_ids: Vec<Uuid> = rows.iter().map(|r| r.location_id).collect();
    let card_type_ids: Vec<Uuid> = rows.iter().map(|r| r.card_type_id).collect();

    let locations: HashMap<Uuid, location::Model> = if location_ids.is_empty() {
        HashMap::new()
    } else {
        location::Entity::find()
            .filter(location::Column::Id.is_in(location_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|l| (l.id, l))
            .collect()
    };
    let card_types: HashMap<Uuid, card_type::Model> = if card_type_ids.is_empty() {
        HashMap::new()
    } else {
        card_type::Entity::find()
            .filter(card_type::Column::Id.is_in(card_type_ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|stock| StockView {
            location: locations.get(&stock.location_id).cloned(),
            card_type: card_types.get(&stock.card_type_id).cloned(),
            is_critical: stock.is_critical(),
            stock,
        })
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StockFilter {
    pub location_id: Option<Uuid>,
    pub card_type_id: Option<Uuid>,
    /// Only rows at or below their alert threshold
    #[serde(default)]
    pub critical: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertThresholdRequest {
    pub id: Uuid,
    #[validate(range(min = 0, message = "alertThreshold must be zero or positive"))]
    pub alert_threshold: i64,
}

/// Read access to stock rows plus the administrative threshold edit.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
    cache: Arc<InMemoryCache>,
    event_sender: EventSender,
}

impl StockService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<InMemoryCache>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            cache,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_stock(&self, filter: StockFilter) -> Result<Vec<StockView>, ServiceError> {
        let db = &*self.db;
        let mut query = stock::Entity::find();
        if let Some(location_id) = filter.location_id {
            query = query.filter(stock::Column::LocationId.eq(location_id));
        }
        if let Some(card_type_id) = filter.card_type_id {
            query = query.filter(stock::Column::CardTypeId.eq(card_type_id));
        }
        if filter.critical {
            query = query
                .filter(stock::Column::AlertThreshold.gt(0))
                .filter(
                    Expr::col(stock::Column::Quantity)
                        .lte(Expr::col(stock::Column::AlertThreshold)),
                );
        }
        let rows = query
            .order_by_asc(stock::Column::LocationId)
            .order_by_asc(stock::Column::CardTypeId)
            .all(db)
            .await?;
        hydrate(db, rows).await
    }

    pub async fn get_stock(&self, id: Uuid) -> Result<stock::Model, ServiceError> {
        stock::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock", id))
    }

    /// Sets the alert threshold of one row; quantity is untouched.
    #[instrument(skip(self))]
    pub async fn set_alert_threshold(
        &self,
        stock_id: Uuid,
        alert_threshold: i64,
    ) -> Result<stock::Model, ServiceError> {
        if alert_threshold < 0 {
            return Err(ServiceError::invalid_field(
                "alertThreshold",
                "alertThreshold must be zero or positive",
            ));
        }

        let existing = self.get_stock(stock_id).await?;
        let mut active: stock::ActiveModel = existing.into();
        active.alert_threshold = Set(alert_threshold);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        info!(%stock_id, alert_threshold, "alert threshold updated");
        self.event_sender
            .publish_all(vec![Event::AlertThresholdChanged {
                stock_id,
                alert_threshold,
            }])
            .await;

        Ok(updated)
    }
}
