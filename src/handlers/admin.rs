use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::{
    AccountService, CreditService, LedgerService, RenewalService, VoucherService,
};
use crate::utils::Role;

#[utoipa::path(
    post,
    path = "/admin/accounts",
    tag = "admin",
    request_body = CreateAccountRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "账户已创建", body = AccountResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_account(
    account_service: web::Data<AccountService>,
    req: HttpRequest,
    request: web::Json<CreateAccountRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = current_principal(&req, &[Role::Admin]) {
        return Ok(e.error_response());
    }

    match account_service.create_account(request.into_inner()).await {
        Ok(account) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": account
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/vouchers",
    tag = "admin",
    request_body = CreateVoucherRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "优惠券已创建", body = VoucherResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_voucher(
    voucher_service: web::Data<VoucherService>,
    req: HttpRequest,
    request: web::Json<CreateVoucherRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match voucher_service
        .create_voucher(principal.id, request.into_inner())
        .await
    {
        Ok(voucher) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": voucher
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/accounts/{id}/grant",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "账户ID")
    ),
    request_body = GrantPointsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "积分已发放", body = LedgerEntryResponse),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn grant_points(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<GrantPointsRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };
    let request = request.into_inner();

    match ledger_service
        .grant_points(
            path.into_inner(),
            request.points,
            principal.id,
            request.description,
        )
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LedgerEntryResponse::from(entry)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/ledger/{entry_id}/reverse",
    tag = "admin",
    params(
        ("entry_id" = i64, Path, description = "分录ID")
    ),
    request_body = ReverseEntryRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "已冲正", body = LedgerEntryResponse),
        (status = 400, description = "不可冲正"),
        (status = 422, description = "余额不足")
    )
)]
pub async fn reverse_entry(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ReverseEntryRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match ledger_service
        .reverse_entry(path.into_inner(), principal.id, request.into_inner().reason)
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LedgerEntryResponse::from(entry)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/accounts/{id}/reconcile",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "账户ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "对账结果", body = Reconciliation),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn reconcile_account(
    ledger_service: web::Data<LedgerService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = current_principal(&req, &[Role::Admin]) {
        return Ok(e.error_response());
    }

    match ledger_service.reconcile(path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": result
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/credit-accounts",
    tag = "admin",
    request_body = AllocateCreditRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "额度账户已开立", body = CreditAccountResponse),
        (status = 400, description = "请求参数错误"),
        (status = 404, description = "账户不存在")
    )
)]
pub async fn allocate_credit(
    credit_service: web::Data<CreditService>,
    req: HttpRequest,
    request: web::Json<AllocateCreditRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match credit_service
        .allocate(principal.id, request.into_inner())
        .await
    {
        Ok(credit) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": credit
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/credit-accounts/{id}",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "额度账户ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "额度账户详情", body = CreditAccountResponse),
        (status = 404, description = "额度账户不存在")
    )
)]
pub async fn get_credit(
    credit_service: web::Data<CreditService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    if let Err(e) = current_principal(&req, &[Role::Staff, Role::Admin]) {
        return Ok(e.error_response());
    }

    match credit_service.get(path.into_inner()).await {
        Ok(credit) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": CreditAccountResponse::from(credit)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/credit-accounts/{id}/consume",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "额度账户ID")
    ),
    request_body = ConsumeCreditRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "额度已扣减", body = CreditAccountResponse),
        (status = 410, description = "本周期已结束"),
        (status = 422, description = "额度不足")
    )
)]
pub async fn consume_credit(
    credit_service: web::Data<CreditService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ConsumeCreditRequest>,
) -> Result<HttpResponse> {
    let principal = match current_principal(&req, &[Role::Staff, Role::Admin]) {
        Ok(p) => p,
        Err(e) => return Ok(e.error_response()),
    };

    match credit_service
        .consume(path.into_inner(), principal.id, request.into_inner())
        .await
    {
        Ok(credit) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": credit
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/renewal/run",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "续期批处理完成", body = RenewalReport),
        (status = 403, description = "无权限")
    )
)]
pub async fn run_renewal(
    renewal_service: web::Data<RenewalService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = current_principal(&req, &[Role::Admin]) {
        return Ok(e.error_response());
    }

    match renewal_service.run_annual_renewal().await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": report,
            "message": "续期批处理完成"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/accounts", web::post().to(create_account))
            .route("/accounts/{id}/grant", web::post().to(grant_points))
            .route("/accounts/{id}/reconcile", web::get().to(reconcile_account))
            .route("/vouchers", web::post().to(create_voucher))
            .route("/ledger/{entry_id}/reverse", web::post().to(reverse_entry))
            .route("/credit-accounts", web::post().to(allocate_credit))
            .route("/credit-accounts/{id}", web::get().to(get_credit))
            .route("/credit-accounts/{id}/consume", web::post().to(consume_credit))
            .route("/renewal/run", web::post().to(run_renewal)),
    );
}
