use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Quantity counter for one (location, card type) pair.
///
/// At most one row exists per pair (unique index on
/// `(location_id, card_type_id)`) and `quantity` never goes below zero.
/// Rows are created lazily by the inventory store and are never deleted
/// by the ledger; a row may sit at zero indefinitely.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Stock)]
#[sea_orm(table_name = "stocks")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub location_id: Uuid,
    pub card_type_id: Uuid,
    pub quantity: i64,
    /// Zero disables low-stock alerts for the row.
    pub alert_threshold: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_critical(&self) -> bool {
        is_critical(self.quantity, self.alert_threshold)
    }
}

/// A row is critical when alerts are enabled and the quantity reached the threshold.
pub fn is_critical(quantity: i64, alert_threshold: i64) -> bool {
    alert_threshold > 0 && quantity <= alert_threshold
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::location::Entity",
        from = "Column::LocationId",
        to = "super::location::Column::Id"
    )]
    Location,
    #[sea_orm(
        belongs_to = "super::card_type::Entity",
        from = "Column::CardTypeId",
        to = "super::card_type::Column::Id"
    )]
    CardType,
}

impl Related<super::location::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Location.def()
    }
}

impl Related<super::card_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CardType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
