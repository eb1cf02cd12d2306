use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// 消费积分
    #[sea_orm(string_value = "earn")]
    Earn,
    /// 领取优惠券时扣除积分
    #[sea_orm(string_value = "claim")]
    Claim,
    /// 门店核销优惠券（积分变动为 0，记录券面值）
    #[sea_orm(string_value = "redeem")]
    Redeem,
    #[sea_orm(string_value = "grant")]
    Grant,
    /// 投资人 / 媒体额度消耗
    #[sea_orm(string_value = "spend")]
    Spend,
    #[sea_orm(string_value = "renewal")]
    Renewal,
    #[sea_orm(string_value = "expiry")]
    Expiry,
    #[sea_orm(string_value = "birthday")]
    Birthday,
    #[sea_orm(string_value = "streak")]
    Streak,
    /// 冲正分录
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

impl std::fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerEntryKind::Earn => "earn",
            LedgerEntryKind::Claim => "claim",
            LedgerEntryKind::Redeem => "redeem",
            LedgerEntryKind::Grant => "grant",
            LedgerEntryKind::Spend => "spend",
            LedgerEntryKind::Renewal => "renewal",
            LedgerEntryKind::Expiry => "expiry",
            LedgerEntryKind::Birthday => "birthday",
            LedgerEntryKind::Streak => "streak",
            LedgerEntryKind::Adjustment => "adjustment",
        };
        write!(f, "{s}")
    }
}

/// 不可变分录。`credit_account_id` 为空表示积分账本，否则属于对应的额度账户。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub credit_account_id: Option<i64>,
    pub kind: LedgerEntryKind,
    pub points_delta: i64,
    pub balance_after: i64,
    pub amount_value: Option<i64>,
    pub outlet: Option<String>,
    pub staff_id: Option<i64>,
    pub voucher_id: Option<i64>,
    pub voucher_instance_id: Option<i64>,
    pub reverses_entry_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
