use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PosScanRequest {
    pub token: String,
    /// 消费金额（货币单位），积分码必填
    pub amount: Option<i64>,
    pub outlet: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScanResult {
    PointsAwarded {
        customer_id: i64,
        points_awarded: i64,
        streak_bonus: i64,
        new_balance: i64,
        ledger_entry_id: i64,
    },
    VoucherRedeemed {
        customer_id: i64,
        voucher_instance_id: Uuid,
        voucher_id: i64,
        title: String,
        cash_value: i64,
        used_at: DateTime<Utc>,
        ledger_entry_id: i64,
    },
}
