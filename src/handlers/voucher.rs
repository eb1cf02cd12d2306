use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::VoucherService;
use crate::utils::Role;

#[utoipa::path(
    get,
    path = "/vouchers",
    tag = "voucher",
    responses(
        (status = 200, description = "可领取的优惠券", body = [VoucherResponse])
    )
)]
pub async fn list_vouchers(voucher_service: web::Data<VoucherService>) -> Result<HttpResponse> {
    match voucher_service.list_active_vouchers().await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": list
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/vouchers/{id}/claim",
    tag = "voucher",
    params(
        ("id" = i64, Path, description = "优惠券ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "领取成功", body = ClaimVoucherResponse),
        (status = 400, description = "优惠券不可领取"),
        (status = 422, description = "积分不足")
    )
)]
pub async fn claim_voucher(
    voucher_service: web::Data<VoucherService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Customer]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match voucher_service
        .claim(principal.id, path.into_inner())
        .await
    {
        Ok(claimed) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": claimed
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/vouchers/instances",
    tag = "voucher",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "active/used/expired")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "我的优惠券"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_instances(
    voucher_service: web::Data<VoucherService>,
    req: HttpRequest,
    query: web::Query<VoucherInstanceQuery>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Customer]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match voucher_service.list_instances(principal.id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/vouchers/instances/{uuid}/qr",
    tag = "voucher",
    params(
        ("uuid" = Uuid, Path, description = "优惠券实例ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "生成核销码", body = QrTokenResponse),
        (status = 404, description = "优惠券不存在"),
        (status = 409, description = "已使用"),
        (status = 410, description = "已过期")
    )
)]
pub async fn issue_redemption_qr(
    voucher_service: web::Data<VoucherService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Customer]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match voucher_service
        .issue_redemption_token(principal.id, path.into_inner())
        .await
    {
        Ok(token) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": token
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn voucher_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vouchers")
            .route("", web::get().to(list_vouchers))
            .route("/instances", web::get().to(list_instances))
            .route("/instances/{uuid}/qr", web::post().to(issue_redemption_qr))
            .route("/{id}/claim", web::post().to(claim_voucher)),
    );
}
