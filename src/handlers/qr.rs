use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::AccountService;
use crate::utils::Role;

#[utoipa::path(
    post,
    path = "/qr/identity",
    tag = "qr",
    request_body = IdentityQrRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "生成会员身份码", body = QrTokenResponse),
        (status = 401, description = "未授权"),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn issue_identity(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
    request: Option<web::Json<IdentityQrRequest>>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Customer]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };
    let static_code = request.map(|r| r.static_code).unwrap_or(false);

    match account_service
        .issue_identity_token(principal.id, static_code)
        .await
    {
        Ok(token) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": token
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn qr_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/qr").route("/identity", web::post().to(issue_identity)));
}
