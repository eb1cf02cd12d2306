use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::LedgerService;
use crate::utils::Role;

#[utoipa::path(
    get,
    path = "/ledger",
    tag = "ledger",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "积分余额与流水"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_ledger(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    query: web::Query<LedgerQuery>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Customer]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };
    let params = PaginationParams::new(query.page, query.per_page);

    let points_balance = match ledger_service.balance_of(principal.id).await {
        Ok(b) => b,
        Err(e) => return Ok(e.error_response()),
    };
    match ledger_service.list_entries(principal.id, &params).await {
        Ok(entries) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LedgerOverviewResponse {
                points_balance,
                entries,
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn ledger_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/ledger", web::get().to(get_ledger));
}
