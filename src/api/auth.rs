// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{post, web, Error, HttpMessage, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::task::{Context, Poll};
use utoipa::ToSchema;

use crate::{db, email, AppState};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Viewer email. The entitlement engine keys everything on it.
    sub: String,
    exp: usize,
}

/// Authenticated viewer identity, inserted by [`JwtMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestOtpBody {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpBody {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub email: String,
}

fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

/// True when `expires_at` has passed.
pub fn otp_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at
}

#[utoipa::path(
    post,
    path = "/auth/request-otp",
    request_body = RequestOtpBody,
    responses((status = 200, description = "OTP sent")),
    tag = "auth"
)]
#[post("/auth/request-otp")]
pub async fn request_otp(
    state: web::Data<AppState>,
    payload: web::Json<RequestOtpBody>,
) -> impl Responder {
    let email_addr = payload.email.trim().to_lowercase();

    if !email_addr.contains('@') || !email_addr.contains('.') {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false, "message": "Valid email is required"
        }));
    }

    if !state.config.is_allowed_email(&email_addr) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "success": false, "message": "Email domain not allowed"
        }));
    }

    if let Err(e) = db::upsert_user(&state.pool, &email_addr).await {
        eprintln!("request_otp upsert user error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    let otp = generate_otp();
    let code_hash = match hash(&otp, DEFAULT_COST) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("bcrypt hash error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let expires_at = Utc::now() + Duration::minutes(state.config.otp_expiry_minutes);

    if let Err(e) = sqlx::query(
        r#"INSERT INTO otps (email, code_hash, expires_at) VALUES ($1, $2, $3)"#,
    )
    .bind(&email_addr)
    .bind(&code_hash)
    .bind(expires_at)
    .execute(&state.pool)
    .await
    {
        eprintln!("request_otp insert error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = email::send_otp_email(
        &state.config,
        &email_addr,
        &otp,
        state.config.otp_expiry_minutes,
    )
    .await
    {
        log::error!("otp email send error for {email_addr}: {e}");
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false, "message": "Failed to send OTP email"
        }));
    }

    HttpResponse::Ok().json(serde_json::json!({
        "success": true, "message": "OTP sent"
    }))
}

#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = VerifyOtpBody,
    responses((status = 200, body = AuthResponse)),
    tag = "auth"
)]
#[post("/auth/verify-otp")]
pub async fn verify_otp(
    state: web::Data<AppState>,
    payload: web::Json<VerifyOtpBody>,
) -> impl Responder {
    let email_addr = payload.email.trim().to_lowercase();

    let row = match sqlx::query(
        r#"SELECT id, code_hash, expires_at
           FROM otps
           WHERE email = $1 AND consumed = FALSE
           ORDER BY created_at DESC
           LIMIT 1"#,
    )
    .bind(&email_addr)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("verify_otp select error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(row) = row else {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false, "message": "Invalid or expired OTP"
        }));
    };

    let otp_id: i32 = row.get("id");
    let code_hash: String = row.get("code_hash");
    let expires_at: DateTime<Utc> = row.get("expires_at");

    if otp_expired(expires_at, Utc::now()) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false, "message": "Invalid or expired OTP"
        }));
    }

    match verify(payload.otp.trim(), &code_hash) {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "success": false, "message": "Invalid or expired OTP"
            }));
        }
        Err(e) => {
            eprintln!("bcrypt verify error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    // Single-use: consumed before the token is issued.
    if let Err(e) = sqlx::query("UPDATE otps SET consumed = TRUE WHERE id = $1")
        .bind(otp_id)
        .execute(&state.pool)
        .await
    {
        eprintln!("verify_otp consume error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    let token = match generate_jwt(
        &state.config.jwt_secret,
        &email_addr,
        state.config.jwt_expiry_days,
    ) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("jwt encode error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(AuthResponse {
        success: true,
        token,
        email: email_addr,
    })
}

pub fn generate_jwt(
    secret: &str,
    email: &str,
    expiry_days: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (Utc::now() + Duration::days(expiry_days)).timestamp() as usize;

    let claims = Claims {
        sub: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Middleware that:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the JWT against the configured secret
/// - puts an [`AuthUser`] into `req.extensions_mut()`
pub struct JwtMiddleware;

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner { service }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let secret = match req.app_data::<web::Data<AppState>>() {
            Some(state) => state.config.jwt_secret.clone(),
            None => {
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError(
                        "app state not configured",
                    ))
                })
            }
        };

        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_ref()),
                &Validation::default(),
            ) {
                Ok(token_data) => {
                    req.extensions_mut().insert(AuthUser {
                        email: token_data.claims.sub,
                    });
                    let fut = self.service.call(req);
                    return Box::pin(async move { fut.await });
                }
                Err(_) => {
                    return Box::pin(async move {
                        Err(actix_web::error::ErrorUnauthorized("Invalid token"))
                    })
                }
            }
        }

        Box::pin(async move {
            Err(actix_web::error::ErrorUnauthorized(
                "Missing or invalid Authorization header",
            ))
        })
    }
}
