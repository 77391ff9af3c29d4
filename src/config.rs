// src/config.rs

use std::env;

/// All env-derived settings, loaded once in `main` and carried in `AppState`.
/// Handlers and the entitlement evaluator receive what they need from here
/// instead of reading the environment themselves.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    pub otp_expiry_minutes: i64,
    /// Allowed email domains for OTP sign-in. Empty = any domain.
    pub allowed_email_domains: Vec<String>,
    /// Batch key used to resolve student records, e.g. "2428".
    pub student_batch: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub smtp_host: String,
    pub smtp_user: String,
    pub smtp_password: String,
    pub smtp_from: String,
    /// Push delivery is disabled when unset.
    pub fcm_server_key: Option<String>,
    pub admin_api_key: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let allowed_email_domains = env::var("ALLOWED_EMAIL_DOMAINS")
            .unwrap_or_default()
            .split(',')
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET required"),
            jwt_expiry_days: env::var("JWT_EXPIRY_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            otp_expiry_minutes: env::var("OTP_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            allowed_email_domains,
            student_batch: env::var("STUDENT_BATCH").unwrap_or_else(|_| "2428".to_string()),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").expect("RAZORPAY_KEY_ID required"),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET")
                .expect("RAZORPAY_KEY_SECRET required"),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_user: env::var("SMTP_USER").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from: env::var("SMTP_FROM")
                .unwrap_or_else(|_| env::var("SMTP_USER").unwrap_or_default()),
            fcm_server_key: env::var("FCM_SERVER_KEY").ok(),
            admin_api_key: env::var("ADMIN_API_KEY").expect("ADMIN_API_KEY required"),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
        }
    }

    /// Domain allowlist check for OTP sign-in.
    pub fn is_allowed_email(&self, email: &str) -> bool {
        if self.allowed_email_domains.is_empty() {
            return true;
        }
        match email.rsplit_once('@') {
            Some((_, domain)) => {
                let domain = domain.to_lowercase();
                self.allowed_email_domains.iter().any(|d| *d == domain)
            }
            None => false,
        }
    }
}
