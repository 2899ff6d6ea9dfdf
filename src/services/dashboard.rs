//! Read-only aggregation over stock and ledger, served through the cache.
//!
//! Three independent entries back the dashboard: `dashboard:stats`,
//! `dashboard:movements_by_month` and `dashboard:recent_activity`. Any
//! committed mutation drops all of them through `dashboard:*`.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{
    sea_query::{Alias, Expr},
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::InMemoryCache;
use crate::config::CacheConfig;
use crate::entities::{bank, card_type, location, movement, report, stock, user};
use crate::errors::ServiceError;
use crate::services::inventory::{hydrate, StockView};
use crate::services::ledger;

pub const STATS_KEY: &str = "dashboard:stats";
pub const TREND_KEY: &str = "dashboard:movements_by_month";
pub const ACTIVITY_KEY: &str = "dashboard:recent_activity";

/// Number of months in the movement trend, current month included.
pub const TREND_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_stock: i64,
    pub critical_stock_count: u64,
    pub critical_stock: Vec<StockView>,
    pub total_banks: u64,
    pub total_locations: u64,
    pub total_card_types: u64,
    pub total_movements: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Movement,
    User,
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub id: Uuid,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub movements_by_month: Vec<MonthBucket>,
    pub recent_activity: Vec<ActivityItem>,
}

#[derive(Debug, FromQueryResult)]
struct StockTotal {
    total: Option<i64>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
    cache: Arc<InMemoryCache>,
    config: CacheConfig,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>, cache: Arc<InMemoryCache>, config: CacheConfig) -> Self {
        Self { db, cache, config }
    }

    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Result<DashboardSnapshot, ServiceError> {
        let stats = self
            .cache
            .get_or_set(STATS_KEY, self.config.stats_ttl(), || self.compute_stats())
            .await?;
        let movements_by_month = self
            .cache
            .get_or_set(TREND_KEY, self.config.trend_ttl(), || self.compute_trend())
            .await?;
        let recent_activity = self
            .cache
            .get_or_set(ACTIVITY_KEY, self.config.activity_ttl(), || {
                self.compute_activity()
            })
            .await?;

        Ok(DashboardSnapshot {
            stats,
            movements_by_month,
            recent_activity,
        })
    }

    async fn compute_stats(&self) -> Result<DashboardStats, ServiceError> {
        let db = &*self.db;

        let total_stock = stock::Entity::find()
            .select_only()
            .column_as(
                Expr::col(stock::Column::Quantity)
                    .sum()
                    .cast_as(Alias::new("BIGINT")),
                "total",
            )
            .into_model::<StockTotal>()
            .one(db)
            .await?
            .and_then(|t| t.total)
            .unwrap_or(0);

        let critical_rows = stock::Entity::find()
            .filter(stock::Column::AlertThreshold.gt(0))
            .filter(Expr::col(stock::Column::Quantity).lte(Expr::col(stock::Column::AlertThreshold)))
            .order_by_asc(stock::Column::Quantity)
            .all(db)
            .await?;
        let critical_stock = hydrate(db, critical_rows).await?;

        Ok(DashboardStats {
            total_stock,
            critical_stock_count: critical_stock.len() as u64,
            critical_stock,
            total_banks: bank::Entity::find().count(db).await?,
            total_locations: location::Entity::find().count(db).await?,
            total_card_types: card_type::Entity::find().count(db).await?,
            total_movements: ledger::count_movements(db).await?,
            generated_at: Utc::now(),
        })
    }

    async fn compute_trend(&self) -> Result<Vec<MonthBucket>, ServiceError> {
        let now = Utc::now();
        let since = trend_start(now);
        let rows = ledger::movements_since(&*self.db, since).await?;
        Ok(bucket_by_month(now, rows.iter().map(|m| m.created_at)))
    }

    async fn compute_activity(&self) -> Result<Vec<ActivityItem>, ServiceError> {
        let db = &*self.db;
        let movements = ledger::recent_movements(db, self.config.recent_movements_limit).await?;

        let card_type_ids: Vec<Uuid> = movements.iter().map(|m| m.card_type_id).collect();
        let labels: HashMap<Uuid, String> = if card_type_ids.is_empty() {
            HashMap::new()
        } else {
            card_type::Entity::find()
                .filter(card_type::Column::Id.is_in(card_type_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c.label()))
                .collect()
        };

        let users = if self.config.recent_users_limit == 0 {
            Vec::new()
        } else {
            user::Entity::find()
                .order_by_desc(user::Column::CreatedAt)
                .limit(self.config.recent_users_limit)
                .all(db)
                .await?
        };
        let reports = if self.config.recent_reports_limit == 0 {
            Vec::new()
        } else {
            report::Entity::find()
                .order_by_desc(report::Column::CreatedAt)
                .limit(self.config.recent_reports_limit)
                .all(db)
                .await?
        };

        let mut items: Vec<ActivityItem> = movements
            .iter()
            .map(|m| movement_activity(m, labels.get(&m.card_type_id)))
            .chain(users.into_iter().map(|u| ActivityItem {
                kind: ActivityKind::User,
                id: u.id,
                label: format!("New account: {} ({})", u.name, u.role),
                timestamp: u.created_at,
            }))
            .chain(reports.into_iter().map(|r| ActivityItem {
                kind: ActivityKind::Report,
                id: r.id,
                label: format!("Report generated: {}", r.title),
                timestamp: r.created_at,
            }))
            .collect();

        Ok(merge_activity(&mut items, self.config.activity_feed_cap))
    }
}

fn movement_activity(m: &movement::Model, card_label: Option<&String>) -> ActivityItem {
    let card = card_label
        .cloned()
        .unwrap_or_else(|| m.card_type_id.to_string());
    ActivityItem {
        kind: ActivityKind::Movement,
        id: m.id,
        label: format!("{} {} x {}", m.movement_type, m.quantity, card),
        timestamp: m.created_at,
    }
}

/// Newest first, capped.
pub fn merge_activity(items: &mut Vec<ActivityItem>, cap: usize) -> Vec<ActivityItem> {
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.truncate(cap);
    std::mem::take(items)
}

/// `(year, month)` pairs of the trailing window, oldest first.
pub fn trend_months(now: DateTime<Utc>) -> Vec<(i32, u32)> {
    let current = now.year() * 12 + now.month0() as i32;
    (0..TREND_MONTHS as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
        })
        .collect()
}

/// First instant of the oldest month in the window.
pub fn trend_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = trend_months(now)[0];
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Counts timestamps per month of the window; months without rows count zero.
pub fn bucket_by_month<I>(now: DateTime<Utc>, timestamps: I) -> Vec<MonthBucket>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let months = trend_months(now);
    let mut counts: HashMap<(i32, u32), u64> = months.iter().map(|m| (*m, 0)).collect();
    for ts in timestamps {
        if let Some(count) = counts.get_mut(&(ts.year(), ts.month())) {
            *count += 1;
        }
    }
    months
        .into_iter()
        .map(|(year, month)| MonthBucket {
            month: format!("{:04}-{:02}", year, month),
            count: counts.get(&(year, month)).copied().unwrap_or(0),
        })
        .collect()
}
