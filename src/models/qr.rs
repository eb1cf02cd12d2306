use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct IdentityQrRequest {
    /// 长期有效的会员码（打印 / 钱包卡片），否则为短时效 POS 码
    #[serde(default, rename = "static")]
    pub static_code: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QrTokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}
