use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::time::Duration;

use loyalty_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::build_notifier,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::{JwtService, QrTokenService},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 创建数据库连接池并运行迁移
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let storage_timeout = Duration::from_secs(config.database.statement_timeout_secs);
    let jwt_service = JwtService::new(&config.auth.secret);
    let qr_service = QrTokenService::new(
        &config.qr.secret,
        config.qr.pos_token_ttl_secs,
        config.qr.static_identity_ttl_secs,
    );
    let notifier = build_notifier(&config.notification)?;
    let audit_service = AuditService::database(pool.clone());

    // 创建服务
    let account_service = AccountService::new(pool.clone(), qr_service.clone());
    let ledger_service = LedgerService::new(pool.clone(), storage_timeout);
    let voucher_service = VoucherService::new(
        pool.clone(),
        qr_service.clone(),
        audit_service.clone(),
        config.loyalty.voucher_validity_days,
        storage_timeout,
    );
    let pos_service = PosService::new(
        pool.clone(),
        qr_service.clone(),
        audit_service.clone(),
        notifier.clone(),
        config.loyalty.clone(),
        storage_timeout,
    );
    let credit_service = CreditService::new(
        pool.clone(),
        audit_service.clone(),
        config.renewal.cycle_months,
        storage_timeout,
    );
    // 批处理按类别整体提交，使用独立的时限
    let renewal_service = RenewalService::new(
        pool.clone(),
        voucher_service.clone(),
        audit_service.clone(),
        config.renewal.cycle_months,
        Duration::from_secs(config.renewal.timeout_secs),
    );
    let birthday_reward_service = BirthdayRewardService::new(
        pool.clone(),
        config.loyalty.birthday_bonus_points,
        storage_timeout,
    );

    // 启动后台定时任务
    tasks::spawn_all(
        renewal_service.clone(),
        birthday_reward_service,
        Duration::from_secs(config.renewal.check_interval_secs),
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(account_service.clone()))
            .app_data(web::Data::new(ledger_service.clone()))
            .app_data(web::Data::new(voucher_service.clone()))
            .app_data(web::Data::new(pos_service.clone()))
            .app_data(web::Data::new(credit_service.clone()))
            .app_data(web::Data::new(renewal_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::qr_config)
                    .configure(handlers::voucher_config)
                    .configure(handlers::pos_config)
                    .configure(handlers::ledger_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
