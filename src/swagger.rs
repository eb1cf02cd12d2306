use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    AccountType, CreditCategory, LedgerEntryKind, VoucherInstanceStatus, VoucherType,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::qr::issue_identity,
        handlers::voucher::list_vouchers,
        handlers::voucher::claim_voucher,
        handlers::voucher::list_instances,
        handlers::voucher::issue_redemption_qr,
        handlers::pos::scan,
        handlers::ledger::get_ledger,
        handlers::admin::create_account,
        handlers::admin::create_voucher,
        handlers::admin::grant_points,
        handlers::admin::reverse_entry,
        handlers::admin::reconcile_account,
        handlers::admin::allocate_credit,
        handlers::admin::get_credit,
        handlers::admin::consume_credit,
        handlers::admin::run_renewal,
    ),
    components(
        schemas(
            AccountType,
            AccountResponse,
            CreateAccountRequest,
            IdentityQrRequest,
            QrTokenResponse,
            VoucherType,
            VoucherInstanceStatus,
            VoucherResponse,
            VoucherInstanceResponse,
            VoucherInstanceQuery,
            CreateVoucherRequest,
            ClaimVoucherResponse,
            PosScanRequest,
            ScanResult,
            LedgerEntryKind,
            LedgerEntryResponse,
            LedgerQuery,
            GrantPointsRequest,
            ReverseEntryRequest,
            Reconciliation,
            CreditCategory,
            AllocateCreditRequest,
            ConsumeCreditRequest,
            CreditAccountResponse,
            CategoryOutcome,
            RenewalReport,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "qr", description = "Member identity QR API"),
        (name = "voucher", description = "Voucher catalog and wallet API"),
        (name = "pos", description = "Point-of-sale scan API"),
        (name = "ledger", description = "Points ledger API"),
        (name = "admin", description = "Back-office API"),
    ),
    info(
        title = "Loyalty Backend API",
        version = "1.0.0",
        description = "Loyalty ledger and point-of-sale redemption REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
