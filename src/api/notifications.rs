// src/api/notifications.rs

use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::{fcm, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveTokenBody {
    pub fcm_token: String,
    pub device_type: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/notifications/save-token",
    request_body = SaveTokenBody,
    responses((status = 200, description = "Token saved")),
    tag = "notifications"
)]
#[post("/notifications/save-token")]
pub async fn save_token(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<SaveTokenBody>,
) -> impl Responder {
    if payload.fcm_token.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "FCM token is required" }));
    }

    if let Err(e) = sqlx::query(
        r#"INSERT INTO fcm_tokens (user_email, token, device_type)
           VALUES ($1, $2, $3)
           ON CONFLICT (token) DO UPDATE SET user_email = EXCLUDED.user_email,
                                             device_type = EXCLUDED.device_type"#,
    )
    .bind(&user.email)
    .bind(payload.fcm_token.trim())
    .bind(payload.device_type.as_deref())
    .execute(&state.pool)
    .await
    {
        eprintln!("save_token db error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "FCM token saved successfully",
    }))
}

fn admin_key_ok(req: &HttpRequest, state: &AppState) -> bool {
    req.headers()
        .get("X-Admin-Key")
        .and_then(|h| h.to_str().ok())
        .map(|k| k == state.config.admin_api_key)
        .unwrap_or(false)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastBody {
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
}

#[utoipa::path(
    post,
    path = "/notifications/send-to-all",
    request_body = BroadcastBody,
    responses(
        (status = 200, description = "Broadcast dispatched"),
        (status = 401, description = "Missing or wrong admin key"),
    ),
    tag = "notifications"
)]
#[post("/notifications/send-to-all")]
pub async fn send_to_all(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<BroadcastBody>,
) -> impl Responder {
    if !admin_key_ok(&req, &state) {
        return HttpResponse::Unauthorized()
            .json(json!({ "success": false, "message": "Invalid admin key" }));
    }

    if payload.title.trim().is_empty() || payload.body.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Title and body are required" }));
    }

    match fcm::send_to_all(
        &state.pool,
        &state.config,
        &payload.title,
        &payload.body,
        payload.data.clone().unwrap_or_else(|| json!({})),
    )
    .await
    {
        Ok(sent) => HttpResponse::Ok().json(json!({ "success": true, "sent": sent })),
        Err(e) => {
            log::error!("send_to_all error: {e}");
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to send notification" }))
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PersonalizedBroadcastBody {
    pub title: String,
    /// Body template; `{student_name}` is replaced per recipient.
    pub body_template: String,
    pub data: Option<serde_json::Value>,
}

#[utoipa::path(
    post,
    path = "/notifications/send-personalized",
    request_body = PersonalizedBroadcastBody,
    responses(
        (status = 200, description = "Personalized broadcast dispatched"),
        (status = 401, description = "Missing or wrong admin key"),
    ),
    tag = "notifications"
)]
#[post("/notifications/send-personalized")]
pub async fn send_personalized(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<PersonalizedBroadcastBody>,
) -> impl Responder {
    if !admin_key_ok(&req, &state) {
        return HttpResponse::Unauthorized()
            .json(json!({ "success": false, "message": "Invalid admin key" }));
    }

    if payload.title.trim().is_empty() || payload.body_template.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Title and body template are required" }));
    }

    match fcm::send_personalized(
        &state.pool,
        &state.config,
        &payload.title,
        &payload.body_template,
        payload.data.clone().unwrap_or_else(|| json!({})),
    )
    .await
    {
        Ok(sent) => HttpResponse::Ok().json(json!({ "success": true, "sent": sent })),
        Err(e) => {
            log::error!("send_personalized error: {e}");
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to send notification" }))
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendToUserBody {
    pub email: String,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
}

#[utoipa::path(
    post,
    path = "/notifications/send-to-user",
    request_body = SendToUserBody,
    responses(
        (status = 200, description = "Notification dispatched"),
        (status = 401, description = "Missing or wrong admin key"),
    ),
    tag = "notifications"
)]
#[post("/notifications/send-to-user")]
pub async fn send_to_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<SendToUserBody>,
) -> impl Responder {
    if !admin_key_ok(&req, &state) {
        return HttpResponse::Unauthorized()
            .json(json!({ "success": false, "message": "Invalid admin key" }));
    }

    if payload.email.trim().is_empty()
        || payload.title.trim().is_empty()
        || payload.body.trim().is_empty()
    {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Email, title, and body are required" }));
    }

    match fcm::send_to_user(
        &state.pool,
        &state.config,
        payload.email.trim(),
        &payload.title,
        &payload.body,
        payload.data.clone().unwrap_or_else(|| json!({})),
    )
    .await
    {
        Ok(sent) => HttpResponse::Ok().json(json!({ "success": true, "sent": sent })),
        Err(e) => {
            log::error!("send_to_user error: {e}");
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to send notification" }))
        }
    }
}
