use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::PosService;
use crate::utils::Role;

#[utoipa::path(
    post,
    path = "/pos/scan",
    tag = "pos",
    request_body = PosScanRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "积分已发放或优惠券已核销", body = ScanResult),
        (status = 401, description = "二维码无效或已过期"),
        (status = 404, description = "账户或优惠券不存在"),
        (status = 409, description = "优惠券已使用"),
        (status = 410, description = "优惠券已过期"),
        (status = 503, description = "存储不可用，可重试")
    )
)]
pub async fn scan(
    pos_service: web::Data<PosService>,
    req: HttpRequest,
    request: web::Json<PosScanRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Staff, Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };
    let request = request.into_inner();

    match pos_service
        .process_pos_scan(&request.token, request.amount, &request.outlet, principal.id)
        .await
    {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn pos_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/pos").route("/scan", web::post().to(scan)));
}
