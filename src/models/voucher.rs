use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    VoucherInstanceStatus, VoucherType, voucher_entity, voucher_instance_entity,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateVoucherRequest {
    pub title: String,
    pub points_required: i64,
    pub cash_value: i64,
    pub voucher_type: VoucherType,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoucherResponse {
    pub id: i64,
    pub title: String,
    pub points_required: i64,
    pub cash_value: i64,
    pub voucher_type: VoucherType,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<voucher_entity::Model> for VoucherResponse {
    fn from(m: voucher_entity::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            points_required: m.points_required,
            cash_value: m.cash_value,
            voucher_type: m.voucher_type,
            is_active: m.is_active,
            expires_at: m.expires_at,
        }
    }
}

/// 单张券；`status` 为推导后的展示状态
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoucherInstanceResponse {
    pub id: Uuid,
    pub voucher_id: i64,
    pub status: VoucherInstanceStatus,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_at_outlet: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VoucherInstanceResponse {
    pub fn from_model(m: voucher_instance_entity::Model, now: DateTime<Utc>) -> Self {
        Self {
            status: m.effective_status(now),
            id: m.public_id,
            voucher_id: m.voucher_id,
            expires_at: m.expires_at,
            used_at: m.used_at,
            used_at_outlet: m.used_at_outlet,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct VoucherInstanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// active/used/expired
    pub status: Option<VoucherInstanceStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClaimVoucherResponse {
    pub instance: VoucherInstanceResponse,
    pub points_spent: i64,
    pub remaining_points: i64,
}
