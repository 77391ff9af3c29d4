// src/fcm.rs
//
// Push delivery through the FCM legacy HTTP API. Auth: `key=<server key>`
// header. Delivery failures for individual tokens are logged and skipped;
// the portal never blocks on push.

use serde_json::json;
use sqlx::{PgPool, Row};
use std::fmt;

use crate::config::AppConfig;

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

#[derive(Debug)]
pub enum FcmError {
    Db(sqlx::Error),
    Http(reqwest::Error),
}

impl fmt::Display for FcmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FcmError::Db(e) => write!(f, "db error: {e}"),
            FcmError::Http(e) => write!(f, "http error: {e}"),
        }
    }
}

impl From<sqlx::Error> for FcmError {
    fn from(value: sqlx::Error) -> Self {
        Self::Db(value)
    }
}

impl From<reqwest::Error> for FcmError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

async fn send_one(
    client: &reqwest::Client,
    server_key: &str,
    token: &str,
    title: &str,
    body: &str,
    data: &serde_json::Value,
) -> bool {
    let payload = json!({
        "to": token,
        "notification": { "title": title, "body": body },
        "data": data,
    });

    let resp = client
        .post(FCM_SEND_URL)
        .header("Authorization", format!("key={server_key}"))
        .json(&payload)
        .send()
        .await;

    match resp {
        Ok(r) if r.status().is_success() => true,
        Ok(r) => {
            log::warn!("fcm send failed status={} token={}", r.status(), token);
            false
        }
        Err(e) => {
            log::warn!("fcm send error: {e}");
            false
        }
    }
}

async fn send_to_tokens(
    server_key: &str,
    tokens: &[String],
    title: &str,
    body: &str,
    data: &serde_json::Value,
) -> Result<usize, FcmError> {
    let client = reqwest::Client::new();
    let mut sent = 0;

    for token in tokens {
        if send_one(&client, server_key, token, title, body, data).await {
            sent += 1;
        }
    }

    Ok(sent)
}

/// Fills the `{student_name}` placeholder in a broadcast template.
/// Recipients without a student record get the generic salutation.
pub fn personalize_body(template: &str, student_name: Option<&str>) -> String {
    let name = match student_name {
        Some(n) if !n.trim().is_empty() => n.trim(),
        _ => "Student",
    };
    template.replace("{student_name}", name)
}

pub async fn send_to_all(
    pool: &PgPool,
    config: &AppConfig,
    title: &str,
    body: &str,
    data: serde_json::Value,
) -> Result<usize, FcmError> {
    let Some(server_key) = config.fcm_server_key.as_deref() else {
        log::warn!("FCM_SERVER_KEY not set, skipping push");
        return Ok(0);
    };

    let tokens: Vec<String> = sqlx::query("SELECT token FROM fcm_tokens")
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|r| r.get("token"))
        .collect();

    send_to_tokens(server_key, &tokens, title, body, &data).await
}

/// Broadcast with a per-recipient body: every registered token gets the
/// template with `{student_name}` filled from the student roster, matched
/// on the token owner's email.
pub async fn send_personalized(
    pool: &PgPool,
    config: &AppConfig,
    title: &str,
    body_template: &str,
    data: serde_json::Value,
) -> Result<usize, FcmError> {
    let Some(server_key) = config.fcm_server_key.as_deref() else {
        log::warn!("FCM_SERVER_KEY not set, skipping push");
        return Ok(0);
    };

    let rows = sqlx::query(
        r#"SELECT f.token, s.student_name
           FROM fcm_tokens f
           LEFT JOIN students s ON s.student_email = f.user_email"#,
    )
    .fetch_all(pool)
    .await?;

    let client = reqwest::Client::new();
    let mut sent = 0;

    for row in rows {
        let token: String = row.get("token");
        let student_name: Option<String> = row.get("student_name");
        let body = personalize_body(body_template, student_name.as_deref());

        if send_one(&client, server_key, &token, title, &body, &data).await {
            sent += 1;
        }
    }

    Ok(sent)
}

pub async fn send_to_user(
    pool: &PgPool,
    config: &AppConfig,
    email: &str,
    title: &str,
    body: &str,
    data: serde_json::Value,
) -> Result<usize, FcmError> {
    let Some(server_key) = config.fcm_server_key.as_deref() else {
        log::warn!("FCM_SERVER_KEY not set, skipping push");
        return Ok(0);
    };

    let tokens: Vec<String> = sqlx::query("SELECT token FROM fcm_tokens WHERE user_email = $1")
        .bind(email)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|r| r.get("token"))
        .collect();

    send_to_tokens(server_key, &tokens, title, body, &data).await
}
