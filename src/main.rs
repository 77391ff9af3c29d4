// src/main.rs
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use result_portal_backend::{api, config::AppConfig, docs, AppState};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let port = config.port;
    let state = web::Data::new(AppState { pool, config });

    log::info!("result portal backend listening on port {port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Public auth routes
            .service(api::auth::request_otp)
            .service(api::auth::verify_otp)
            // Admin broadcast routes (X-Admin-Key guarded)
            .service(api::notifications::send_to_all)
            .service(api::notifications::send_personalized)
            .service(api::notifications::send_to_user)
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware)
                    .service(api::users::get_profile)
                    .service(api::users::update_profile)
                    .service(api::results::get_results)
                    .service(api::payment::list_plans)
                    .service(api::payment::my_purchases)
                    .service(api::payment::create_order)
                    .service(api::payment::verify_payment)
                    .service(api::payment::can_view)
                    .service(api::payment::record_view)
                    .service(api::payment::premium_request)
                    .service(api::payment::my_requests)
                    .service(api::notifications::save_token),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
