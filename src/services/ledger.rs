//! The append-only movement ledger and its read APIs.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{movement, stock, user, MovementType};
use crate::errors::ServiceError;

pub const DEFAULT_LIST_LIMIT: u64 = 100;
pub const MAX_LIST_LIMIT: u64 = 500;

/// Fields of a ledger row about to be appended.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub user_id: Uuid,
    pub card_type_id: Uuid,
    pub location_id: Uuid,
    pub dest_location_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub attachments: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub async fn append<C: ConnectionTrait>(
    conn: &C,
    new: NewMovement,
) -> Result<movement::Model, ServiceError> {
    let row = movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        movement_type: Set(new.movement_type),
        quantity: Set(new.quantity),
        user_id: Set(new.user_id),
        card_type_id: Set(new.card_type_id),
        location_id: Set(new.location_id),
        dest_location_id: Set(new.dest_location_id),
        reference_number: Set(new.reference_number),
        notes: Set(new.notes),
        attachments: Set(new.attachments),
        created_at: Set(new.created_at),
    };
    Ok(row.insert(conn).await?)
}

pub async fn find_movement<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<movement::Model, ServiceError> {
    movement::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Movement", id))
}

/// Display label `<ENT|SOR|TRF>-<YYYYMMDD>-<NNNN>` where the counter is the
/// number of movements of the same type already in the ledger plus one.
/// Not a key: concurrent requests may compute the same label.
pub async fn next_reference<C: ConnectionTrait>(
    conn: &C,
    movement_type: MovementType,
    at: DateTime<Utc>,
) -> Result<String, ServiceError> {
    let count = movement::Entity::find()
        .filter(movement::Column::MovementType.eq(movement_type))
        .count(conn)
        .await?;
    Ok(format_reference(movement_type, at, count + 1))
}

pub fn format_reference(movement_type: MovementType, at: DateTime<Utc>, sequence: u64) -> String {
    format!(
        "{}-{}-{:04}",
        movement_type.reference_prefix(),
        at.format("%Y%m%d"),
        sequence
    )
}

/// Newest first.
pub async fn recent_movements<C: ConnectionTrait>(
    conn: &C,
    limit: u64,
) -> Result<Vec<movement::Model>, ServiceError> {
    Ok(movement::Entity::find()
        .order_by_desc(movement::Column::CreatedAt)
        .limit(limit)
        .all(conn)
        .await?)
}

/// Rows created at or after `since`, oldest first.
pub async fn movements_since<C: ConnectionTrait>(
    conn: &C,
    since: DateTime<Utc>,
) -> Result<Vec<movement::Model>, ServiceError> {
    Ok(movement::Entity::find()
        .filter(movement::Column::CreatedAt.gte(since))
        .order_by_asc(movement::Column::CreatedAt)
        .all(conn)
        .await?)
}

pub async fn count_movements<C: ConnectionTrait>(conn: &C) -> Result<u64, ServiceError> {
    Ok(movement::Entity::find().count(conn).await?)
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MovementFilter {
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    /// Matches the source or the destination
    pub location_id: Option<Uuid>,
    pub card_type_id: Option<Uuid>,
    /// Defaults to 100, capped at 500
    pub limit: Option<u64>,
}

impl MovementFilter {
    pub fn effective_limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Ledger row with the acting user joined.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    #[serde(flatten)]
    pub movement: movement::Model,
    pub user: Option<user::Model>,
}

pub async fn list_movements<C: ConnectionTrait>(
    conn: &C,
    filter: &MovementFilter,
) -> Result<Vec<MovementView>, ServiceError> {
    let mut query = movement::Entity::find();
    if let Some(movement_type) = filter.movement_type {
        query = query.filter(movement::Column::MovementType.eq(movement_type));
    }
    if let Some(location_id) = filter.location_id {
        query = query.filter(
            Condition::any()
                .add(movement::Column::LocationId.eq(location_id))
                .add(movement::Column::DestLocationId.eq(location_id)),
        );
    }
    if let Some(card_type_id) = filter.card_type_id {
        query = query.filter(movement::Column::CardTypeId.eq(card_type_id));
    }

    let rows = query
        .order_by_desc(movement::Column::CreatedAt)
        .limit(filter.effective_limit())
        .find_also_related(user::Entity)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(movement, user)| MovementView { movement, user })
        .collect())
}

/// Ledger balance against the stored counter for one (location, card type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub location_id: Uuid,
    pub card_type_id: Uuid,
    /// Σ ENTREE − Σ SORTIE + Σ TRANSFERT in − Σ TRANSFERT out
    pub ledger_balance: i64,
    /// 0 when no stock row exists
    pub stock_quantity: i64,
    pub consistent: bool,
    pub movement_count: u64,
}

pub async fn reconcile<C: ConnectionTrait>(
    conn: &C,
    location_id: Uuid,
    card_type_id: Uuid,
) -> Result<Reconciliation, ServiceError> {
    let rows = movement::Entity::find()
        .filter(movement::Column::CardTypeId.eq(card_type_id))
        .filter(
            Condition::any()
                .add(movement::Column::LocationId.eq(location_id))
                .add(movement::Column::DestLocationId.eq(location_id)),
        )
        .all(conn)
        .await?;
    let ledger_balance = rows
        .iter()
        .map(|m| m.effect_on(location_id, card_type_id))
        .sum::<i64>();

    let stock_quantity = stock::Entity::find()
        .filter(stock::Column::LocationId.eq(location_id))
        .filter(stock::Column::CardTypeId.eq(card_type_id))
        .one(conn)
        .await?
        .map(|s| s.quantity)
        .unwrap_or(0);

    Ok(Reconciliation {
        location_id,
        card_type_id,
        ledger_balance,
        stock_quantity,
        consistent: ledger_balance == stock_quantity,
        movement_count: rows.len() as u64,
    })
}

/// Informational fields of a ledger row that may be edited in place.
#[derive(Debug, Clone, Default)]
pub struct MovementPatch {
    pub quantity: Option<i64>,
    pub notes: Option<String>,
    pub reference_number: Option<String>,
    pub attachments: Option<serde_json::Value>,
}

pub async fn update_movement<C: ConnectionTrait>(
    conn: &C,
    existing: movement::Model,
    patch: MovementPatch,
) -> Result<movement::Model, ServiceError> {
    let mut active: movement::ActiveModel = existing.into();
    if let Some(quantity) = patch.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(notes) = patch.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(reference_number) = patch.reference_number {
        active.reference_number = Set(Some(reference_number));
    }
    if let Some(attachments) = patch.attachments {
        active.attachments = Set(Some(attachments));
    }
    Ok(active.update(conn).await?)
}

pub async fn delete_movement<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    let result = movement::Entity::delete_many()
        .filter(movement::Column::Id.eq(id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::not_found("Movement", id));
    }
    Ok(())
}
