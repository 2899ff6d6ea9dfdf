//! The movement processor.
//!
//! A request is validated without touching the database, then every line
//! item is applied to stock and appended to the ledger inside one
//! transaction. Either all items commit or none do. Cache invalidation and
//! event publication happen only after the commit.

use chrono::Utc;
use metrics::{counter, histogram};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, EntityTrait, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::cache::InMemoryCache;
use crate::entities::{card_type, location, movement, user, MovementType};
use crate::errors::{FieldErrors, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::inventory::{
    apply_delta, decrement_if_sufficient, increment_or_create, StockChange,
};
use crate::services::invariants::{check_positive_quantity, resolve_route, MovementRoute};
use crate::services::ledger::{
    self, MovementFilter, MovementPatch, MovementView, NewMovement, Reconciliation,
};
use crate::services::DASHBOARD_CACHE_PATTERN;

/// One line item of a movement request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementItem {
    pub card_type_id: Uuid,
    /// Strictly positive
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordMovementRequest {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<MovementItem>,
    /// Required for SORTIE and TRANSFERT, ignored for ENTREE
    pub source_location_id: Option<Uuid>,
    /// Required for ENTREE and TRANSFERT, ignored for SORTIE
    pub destination_location_id: Option<Uuid>,
    /// Display label; generated when omitted
    #[validate(length(max = 64))]
    pub reference_number: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub attachments: Option<Value>,
}

/// Ledger rows created by one committed request.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MovementReceipt {
    pub reference_number: String,
    pub movements: Vec<movement::Model>,
}

/// Edit of a committed ledger row. Only informational fields and the
/// quantity can change; the identifying fields are listed so that an
/// attempt to change them is reported instead of silently dropped.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorrectMovementRequest {
    pub id: Uuid,
    pub quantity: Option<i64>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 64))]
    pub reference_number: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub attachments: Option<Value>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub movement_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub card_type_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub location_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub dest_location_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub user_id: Option<Value>,
}

impl CorrectMovementRequest {
    fn locked_fields(&self) -> Vec<&'static str> {
        [
            ("type", self.movement_type.is_some()),
            ("cardTypeId", self.card_type_id.is_some()),
            ("locationId", self.location_id.is_some()),
            ("destLocationId", self.dest_location_id.is_some()),
            ("userId", self.user_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }

    fn has_changes(&self) -> bool {
        self.quantity.is_some()
            || self.notes.is_some()
            || self.reference_number.is_some()
            || self.attachments.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReverseMovementRequest {
    pub id: Uuid,
}

#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseConnection>,
    cache: Arc<InMemoryCache>,
    event_sender: EventSender,
}

impl MovementService {
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

    /// Shape checks that need no database access. Returns the route the
    /// request will take.
    pub fn validate_request(request: &RecordMovementRequest) -> Result<MovementRoute, ServiceError> {
        let mut fields = FieldErrors::new();
        if let Err(e) = request.validate() {
            if let ServiceError::ValidationError { fields: f, .. } = ServiceError::from(e) {
                fields.extend(f);
            }
        }
        for (index, item) in request.items.iter().enumerate() {
            if let Err(ServiceError::ValidationError { fields: f, .. }) =
                check_positive_quantity(index, item.quantity)
            {
                fields.extend(f);
            }
        }
        if let Some(err) = ServiceError::from_fields(fields) {
            return Err(err);
        }

        resolve_route(
            request.movement_type,
            request.source_location_id,
            request.destination_location_id,
        )
    }

    /// Applies every line item of `request` atomically.
    #[instrument(skip(self, request), fields(movement_type = %request.movement_type, items = request.items.len()))]
    pub async fn record(
        &self,
        request: RecordMovementRequest,
    ) -> Result<MovementReceipt, ServiceError> {
        let started = Instant::now();
        let result = self.record_inner(request).await;
        histogram!(
            "cardstock.movements.duration",
            started.elapsed().as_secs_f64()
        );

        match &result {
            Ok(receipt) => {
                counter!(
                    "cardstock.movements.committed",
                    receipt.movements.len() as u64
                );
                info!(
                    reference_number = %receipt.reference_number,
                    rows = receipt.movements.len(),
                    "movement committed"
                );
            }
            Err(e) => {
                counter!("cardstock.movements.rejected", 1);
                if e.is_internal() {
                    warn!(error = %e, "movement rolled back");
                } else {
                    info!(error = %e, "movement rejected");
                }
            }
        }
        result
    }

    async fn record_inner(
        &self,
        request: RecordMovementRequest,
    ) -> Result<MovementReceipt, ServiceError> {
        let route = Self::validate_request(&request)?;
        let db = self.db.as_ref();

        let (receipt, low_stock) = db
            .transaction::<_, (MovementReceipt, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    ensure_user(txn, request.user_id).await?;
                    for location_id in route.locations() {
                        ensure_location(txn, location_id).await?;
                    }

                    let now = Utc::now();
                    let reference_number = match request
                        .reference_number
                        .filter(|r| !r.trim().is_empty())
                    {
                        Some(reference) => reference,
                        None => ledger::next_reference(txn, route.movement_type(), now).await?,
                    };

                    let mut checked_card_types = HashSet::new();
                    let mut movements = Vec::with_capacity(request.items.len());
                    let mut low_stock = Vec::new();

                    for (index, item) in request.items.iter().enumerate() {
                        if checked_card_types.insert(item.card_type_id) {
                            ensure_card_type(txn, item.card_type_id).await?;
                        }

                        let changes = apply_route(txn, route, item.card_type_id, item.quantity)
                            .await
                            .map_err(|e| e.at_item(index))?;
                        low_stock.extend(changes.iter().filter_map(StockChange::low_stock_event));

                        let row = ledger::append(
                            txn,
                            NewMovement {
                                movement_type: route.movement_type(),
                                quantity: item.quantity,
                                user_id: request.user_id,
                                card_type_id: item.card_type_id,
                                location_id: route.ledger_location(),
                                dest_location_id: route.ledger_destination(),
                                reference_number: Some(reference_number.clone()),
                                notes: request.notes.clone(),
                                attachments: request.attachments.clone(),
                                created_at: now,
                            },
                        )
                        .await?;
                        movements.push(row);
                    }

                    Ok((
                        MovementReceipt {
                            reference_number,
                            movements,
                        },
                        low_stock,
                    ))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        let mut events: Vec<Event> = receipt
            .movements
            .iter()
            .map(|m| Event::MovementRecorded {
                movement_id: m.id,
                movement_type: m.movement_type,
                card_type_id: m.card_type_id,
                location_id: m.location_id,
                dest_location_id: m.dest_location_id,
                quantity: m.quantity,
                user_id: m.user_id,
            })
            .collect();
        events.extend(low_stock);
        self.after_commit(events).await;

        Ok(receipt)
    }

    /// Edits a committed row. A quantity change re-applies the difference
    /// to stock with the same atomic operations as a new movement.
    #[instrument(skip(self, request), fields(movement_id = %request.id))]
    pub async fn correct(
        &self,
        request: CorrectMovementRequest,
    ) -> Result<movement::Model, ServiceError> {
        request.validate()?;
        let locked = request.locked_fields();
        if !locked.is_empty() {
            let mut fields = FieldErrors::new();
            for name in locked {
                fields.insert(
                    name.to_string(),
                    vec!["cannot be edited; record a compensating movement instead".to_string()],
                );
            }
            return Err(ServiceError::from_fields(fields)
                .unwrap_or_else(|| ServiceError::validation("locked fields present")));
        }
        if !request.has_changes() {
            return Err(ServiceError::validation("no editable field supplied"));
        }
        if let Some(quantity) = request.quantity {
            if quantity <= 0 {
                return Err(ServiceError::invalid_field(
                    "quantity",
                    "quantity must be a positive integer",
                ));
            }
        }

        let db = self.db.as_ref();
        let (updated, low_stock) = db
            .transaction::<_, (movement::Model, Vec<Event>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = ledger::find_movement(txn, request.id).await?;
                    let mut low_stock = Vec::new();

                    if let Some(quantity) = request.quantity {
                        let delta = quantity - existing.quantity;
                        let changes = apply_effects(txn, &existing, delta).await?;
                        low_stock.extend(changes.iter().filter_map(StockChange::low_stock_event));
                    }

                    let updated = ledger::update_movement(
                        txn,
                        existing,
                        MovementPatch {
                            quantity: request.quantity,
                            notes: request.notes,
                            reference_number: request.reference_number,
                            attachments: request.attachments,
                        },
                    )
                    .await?;
                    Ok((updated, low_stock))
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(movement_id = %updated.id, quantity = updated.quantity, "movement corrected");
        let mut events = vec![Event::MovementCorrected {
            movement_id: updated.id,
        }];
        events.extend(low_stock);
        self.after_commit(events).await;

        Ok(updated)
    }

    /// Undoes the stock effect of a committed row and removes it.
    #[instrument(skip(self))]
    pub async fn reverse(&self, movement_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db.as_ref();
        let low_stock = db
            .transaction::<_, Vec<Event>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = ledger::find_movement(txn, movement_id).await?;
                    let changes = apply_effects(txn, &existing, -existing.quantity).await?;
                    ledger::delete_movement(txn, movement_id).await?;
                    Ok(changes
                        .iter()
                        .filter_map(StockChange::low_stock_event)
                        .collect())
                })
            })
            .await
            .map_err(ServiceError::from)?;

        info!(%movement_id, "movement reversed");
        let mut events = vec![Event::MovementReversed { movement_id }];
        events.extend(low_stock);
        self.after_commit(events).await;
        Ok(())
    }

    pub async fn list(&self, filter: MovementFilter) -> Result<Vec<MovementView>, ServiceError> {
        ledger::list_movements(&*self.db, &filter).await
    }

    pub async fn reconcile(
        &self,
        location_id: Uuid,
        card_type_id: Uuid,
    ) -> Result<Reconciliation, ServiceError> {
        ledger::reconcile(&*self.db, location_id, card_type_id).await
    }

    async fn after_commit(&self, events: Vec<Event>) {
        self.cache.invalidate_pattern(DASHBOARD_CACHE_PATTERN);
        self.event_sender.publish_all(events).await;
    }
}

async fn apply_route<C: ConnectionTrait>(
    conn: &C,
    route: MovementRoute,
    card_type_id: Uuid,
    quantity: i64,
) -> Result<Vec<StockChange>, ServiceError> {
    match route {
        MovementRoute::Entry { destination } => Ok(vec![
            increment_or_create(conn, destination, card_type_id, quantity).await?,
        ]),
        MovementRoute::Withdrawal { source } => Ok(vec![
            decrement_if_sufficient(conn, source, card_type_id, quantity).await?,
        ]),
        MovementRoute::Transfer {
            source,
            destination,
        } => {
            let out = decrement_if_sufficient(conn, source, card_type_id, quantity).await?;
            let into = increment_or_create(conn, destination, card_type_id, quantity).await?;
            Ok(vec![out, into])
        }
    }
}

/// Per-unit stock effect of a ledger row, one entry per touched location.
fn unit_effects(row: &movement::Model) -> Result<Vec<(Uuid, i64)>, ServiceError> {
    match row.movement_type {
        MovementType::Entree => Ok(vec![(row.location_id, 1)]),
        MovementType::Sortie => Ok(vec![(row.location_id, -1)]),
        MovementType::Transfert => {
            let destination = row.dest_location_id.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "transfer movement {} has no destination",
                    row.id
                ))
            })?;
            Ok(vec![(row.location_id, -1), (destination, 1)])
        }
    }
}

/// Applies `scale` times the row's stock effect; decrements run first.
async fn apply_effects<C: ConnectionTrait>(
    conn: &C,
    row: &movement::Model,
    scale: i64,
) -> Result<Vec<StockChange>, ServiceError> {
    let mut deltas: Vec<(Uuid, i64)> = unit_effects(row)?
        .into_iter()
        .map(|(location_id, sign)| (location_id, sign * scale))
        .collect();
    deltas.sort_by_key(|(_, delta)| *delta);

    let mut changes = Vec::with_capacity(deltas.len());
    for (location_id, delta) in deltas {
        if let Some(change) = apply_delta(conn, location_id, row.card_type_id, delta).await? {
            changes.push(change);
        }
    }
    Ok(changes)
}

async fn ensure_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    match user::Entity::find_by_id(id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found("User", id)),
    }
}

async fn ensure_location<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    match location::Entity::find_by_id(id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found("Location", id)),
    }
}

async fn ensure_card_type<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<(), ServiceError> {
    match card_type::Entity::find_by_id(id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::not_found("Card type", id)),
    }
}
