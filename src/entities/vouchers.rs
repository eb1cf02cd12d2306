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
pub enum VoucherType {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "product")]
    Product,
    #[sea_orm(string_value = "experience")]
    Experience,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub points_required: i64,
    pub cash_value: i64,
    pub voucher_type: VoucherType,
    pub is_active: bool,
    /// 目录级别的过期时间，和单张券的过期时间不同
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// 是否仍可领取
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
