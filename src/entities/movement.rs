use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of ledger movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MovementType {
    /// Stock increase at a destination location.
    #[sea_orm(string_value = "ENTREE")]
    #[serde(rename = "ENTREE")]
    Entree,
    /// Stock decrease at a source location.
    #[sea_orm(string_value = "SORTIE")]
    #[serde(rename = "SORTIE")]
    Sortie,
    /// Decrease at the source and increase at the destination.
    #[sea_orm(string_value = "TRANSFERT")]
    #[serde(rename = "TRANSFERT")]
    Transfert,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entree => "ENTREE",
            MovementType::Sortie => "SORTIE",
            MovementType::Transfert => "TRANSFERT",
        }
    }

    /// Prefix used for server generated reference labels.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            MovementType::Entree => "ENT",
            MovementType::Sortie => "SOR",
            MovementType::Transfert => "TRF",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTREE" => Ok(MovementType::Entree),
            "SORTIE" => Ok(MovementType::Sortie),
            "TRANSFERT" => Ok(MovementType::Transfert),
            other => Err(format!("unknown movement type: {}", other)),
        }
    }
}

/// One ledger row.
///
/// ENTREE rows store the destination in `location_id`, SORTIE rows store
/// the source there. TRANSFERT rows store the source in `location_id` and
/// the destination in `dest_location_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = Movement)]
#[sea_orm(table_name = "movements")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: i64,
    pub user_id: Uuid,
    pub card_type_id: Uuid,
    pub location_id: Uuid,
    pub dest_location_id: Option<Uuid>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    #[schema(value_type = Option<Object>)]
    pub attachments: Option<Json>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Signed effect of this row on the stock of `(location_id, card_type_id)`.
    pub fn effect_on(&self, location_id: Uuid, card_type_id: Uuid) -> i64 {
        if self.card_type_id != card_type_id {
            return 0;
        }
        match self.movement_type {
            MovementType::Entree if self.location_id == location_id => self.quantity,
            MovementType::Sortie if self.location_id == location_id => -self.quantity,
            MovementType::Transfert => {
                let mut effect = 0;
                if self.location_id == location_id {
                    effect -= self.quantity;
                }
                if self.dest_location_id == Some(location_id) {
                    effect += self.quantity;
                }
                effect
            }
            _ => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::card_type::Entity",
        from = "Column::CardTypeId",
        to = "super::card_type::Column::Id"
    )]
    CardType,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::card_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CardType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
