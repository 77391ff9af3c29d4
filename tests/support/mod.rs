use sqlx::PgPool;
use std::env;
use std::sync::OnceLock;
use tokio::sync::{Mutex, MutexGuard};

use result_portal_backend::config::AppConfig;
use result_portal_backend::AppState;

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Fresh test database with migrations applied. Returns None (and the test
/// should bail out) when TEST_DATABASE_URL is not configured.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let test_url = match env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping db-backed test");
            return None;
        }
    };
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");

    let _ = sqlx::query("SELECT pg_advisory_lock(424242)")
        .execute(&admin_pool)
        .await;

    let quoted_name = quote_identifier(&db_name);
    let drop_sql = format!("DROP DATABASE IF EXISTS {quoted_name} WITH (FORCE)");
    let create_sql = format!("CREATE DATABASE {quoted_name}");

    let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
    let create_result = sqlx::query(&create_sql).execute(&admin_pool).await;
    if let Err(e) = create_result {
        eprintln!("create test db error: {e}");
        let _ = sqlx::query(&drop_sql).execute(&admin_pool).await;
        sqlx::query(&create_sql)
            .execute(&admin_pool)
            .await
            .expect("create test db retry");
    }

    let _ = sqlx::query("SELECT pg_advisory_unlock(424242)")
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    Some(TestDb {
        pool,
        _guard: guard,
    })
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_expiry_days: 7,
        otp_expiry_minutes: 10,
        allowed_email_domains: vec![],
        student_batch: "2428".to_string(),
        razorpay_key_id: "rzp_test_key".to_string(),
        razorpay_key_secret: "rzp_test_secret".to_string(),
        smtp_host: "localhost".to_string(),
        smtp_user: String::new(),
        smtp_password: String::new(),
        smtp_from: "portal@test.local".to_string(),
        fcm_server_key: None,
        admin_api_key: "test-admin-key".to_string(),
        port: 0,
    }
}

pub fn build_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        config: test_config(),
    }
}
