use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{LedgerEntryKind, ledger_entry_entity};

use super::PaginatedResponse;

/// 写入分录时附带的业务信息
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    pub amount_value: Option<i64>,
    pub outlet: Option<String>,
    pub staff_id: Option<i64>,
    pub voucher_id: Option<i64>,
    pub voucher_instance_id: Option<i64>,
    pub reverses_entry_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub kind: LedgerEntryKind,
    pub points_delta: i64,
    pub balance_after: i64,
    pub amount_value: Option<i64>,
    pub outlet: Option<String>,
    pub voucher_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ledger_entry_entity::Model> for LedgerEntryResponse {
    fn from(m: ledger_entry_entity::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            points_delta: m.points_delta,
            balance_after: m.balance_after,
            amount_value: m.amount_value,
            outlet: m.outlet,
            voucher_id: m.voucher_id,
            description: m.description,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LedgerQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerOverviewResponse {
    pub points_balance: i64,
    pub entries: PaginatedResponse<LedgerEntryResponse>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GrantPointsRequest {
    pub points: i64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ReverseEntryRequest {
    pub reason: String,
}

/// 缓存余额与分录重放结果的对比
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct Reconciliation {
    pub account_id: i64,
    pub cached_balance: i64,
    pub replayed_balance: i64,
    pub entry_count: u64,
    pub consistent: bool,
}
