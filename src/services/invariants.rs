//! Pure checks consulted by the movement processor before and during a
//! ledger transaction. Nothing here touches the database.

use uuid::Uuid;

use crate::entities::MovementType;
use crate::errors::ServiceError;

/// Whether a location slot must be supplied for a movement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    /// Accepted in the payload but ignored.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequirements {
    pub source: Requirement,
    pub destination: Requirement,
}

/// The locations a movement request acts on once its type is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementRoute {
    Entry { destination: Uuid },
    Withdrawal { source: Uuid },
    Transfer { source: Uuid, destination: Uuid },
}

impl MovementRoute {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementRoute::Entry { .. } => MovementType::Entree,
            MovementRoute::Withdrawal { .. } => MovementType::Sortie,
            MovementRoute::Transfer { .. } => MovementType::Transfert,
        }
    }

    /// Location recorded in the ledger row's `location_id`.
    pub fn ledger_location(&self) -> Uuid {
        match *self {
            MovementRoute::Entry { destination } => destination,
            MovementRoute::Withdrawal { source } => source,
            MovementRoute::Transfer { source, .. } => source,
        }
    }

    pub fn ledger_destination(&self) -> Option<Uuid> {
        match *self {
            MovementRoute::Transfer { destination, .. } => Some(destination),
            _ => None,
        }
    }

    pub fn locations(&self) -> Vec<Uuid> {
        match *self {
            MovementRoute::Entry { destination } => vec![destination],
            MovementRoute::Withdrawal { source } => vec![source],
            MovementRoute::Transfer {
                source,
                destination,
            } => vec![source, destination],
        }
    }
}

pub fn required_locations(movement_type: MovementType) -> LocationRequirements {
    use Requirement::*;
    match movement_type {
        MovementType::Entree => LocationRequirements {
            source: Ignored,
            destination: Required,
        },
        MovementType::Sortie => LocationRequirements {
            source: Required,
            destination: Ignored,
        },
        MovementType::Transfert => LocationRequirements {
            source: Required,
            destination: Required,
        },
    }
}

pub fn check_distinct_locations(
    movement_type: MovementType,
    source: Uuid,
    destination: Uuid,
) -> Result<(), ServiceError> {
    if movement_type == MovementType::Transfert && source == destination {
        return Err(ServiceError::MissingLocationForType(
            "source and destination locations must differ for TRANSFERT".to_string(),
        ));
    }
    Ok(())
}

/// Applies the per-type location table and yields the route to execute.
pub fn resolve_route(
    movement_type: MovementType,
    source: Option<Uuid>,
    destination: Option<Uuid>,
) -> Result<MovementRoute, ServiceError> {
    let needs = required_locations(movement_type);
    let missing = |slot: &str| {
        ServiceError::MissingLocationForType(format!(
            "{} is required for {} movements",
            slot, movement_type
        ))
    };

    let source = match needs.source {
        Requirement::Required => Some(source.ok_or_else(|| missing("sourceLocationId"))?),
        Requirement::Ignored => None,
    };
    let destination = match needs.destination {
        Requirement::Required => {
            Some(destination.ok_or_else(|| missing("destinationLocationId"))?)
        }
        Requirement::Ignored => None,
    };

    match (movement_type, source, destination) {
        (MovementType::Entree, _, Some(destination)) => Ok(MovementRoute::Entry { destination }),
        (MovementType::Sortie, Some(source), _) => Ok(MovementRoute::Withdrawal { source }),
        (MovementType::Transfert, Some(source), Some(destination)) => {
            check_distinct_locations(movement_type, source, destination)?;
            Ok(MovementRoute::Transfer {
                source,
                destination,
            })
        }
        _ => Err(ServiceError::InternalError(format!(
            "inconsistent location requirements for {}",
            movement_type
        ))),
    }
}

pub fn check_positive_quantity(index: usize, quantity: i64) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::invalid_field(
            format!("items[{}].quantity", index),
            "quantity must be a positive integer",
        ));
    }
    Ok(())
}

/// `available` is the value read inside the current transaction; `None`
/// means the stock row does not exist yet.
pub fn check_sufficient_stock(
    card_type_id: Uuid,
    location_id: Uuid,
    available: Option<i64>,
    requested: i64,
) -> Result<(), ServiceError> {
    let available = available.unwrap_or(0);
    if available < requested {
        return Err(ServiceError::InsufficientStock {
            card_type_id,
            location_id,
            available,
            requested,
            item_index: None,
        });
    }
    Ok(())
}

/// True when a change from `before` to `after` crosses `alert_threshold`
/// downwards. A zero threshold disables alerts.
pub fn crosses_alert_threshold(before: i64, after: i64, alert_threshold: i64) -> bool {
    alert_threshold > 0 && before > alert_threshold && after <= alert_threshold
}
