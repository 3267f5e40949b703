use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use tombola_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{CloudinaryService, MailService},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
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
    let config = Config::from_toml().expect("Failed to load configuration");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 外部服务
    let mail_service = MailService::new(config.mail.clone());
    let cloudinary = CloudinaryService::new(config.cloudinary.clone());
    if !mail_service.is_enabled() {
        log::warn!("Mail API not configured, emails will only be logged");
    }
    if !cloudinary.is_configured() {
        log::warn!("Cloudinary not configured, image uploads are disabled");
    }

    // 创建服务
    let activity_service = ActivityService::new(pool.clone());
    let auth_service = AuthService::new(
        pool.clone(),
        jwt_service.clone(),
        mail_service,
        activity_service.clone(),
        config.app.public_url.clone(),
    );
    let draw_service = DrawService::new(pool.clone(), activity_service.clone());
    let ticket_service = TicketService::new(pool.clone(), activity_service.clone());
    let profile_service = ProfileService::new(pool.clone(), cloudinary.clone());
    let admin_service = AdminService::new(pool.clone(), cloudinary, activity_service.clone());

    if let Err(e) = auth_service.ensure_admin_account(&config.admin).await {
        log::error!("Failed to seed admin account: {e}");
    }

    tasks::spawn_all(draw_service.clone(), config.app.draw_sweep_interval_secs);

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(draw_service.clone()))
            .app_data(web::Data::new(ticket_service.clone()))
            .app_data(web::Data::new(profile_service.clone()))
            .app_data(web::Data::new(admin_service.clone()))
            .app_data(web::Data::new(activity_service.clone()))
            .configure(swagger_config)
            .configure(handlers::api_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
