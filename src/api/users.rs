// src/api/users.rs

use actix_web::{get, put, web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses((status = 200, description = "Current user profile")),
    tag = "users"
)]
#[get("/users/profile")]
pub async fn get_profile(user: web::ReqData<AuthUser>, state: web::Data<AppState>) -> impl Responder {
    let row = match sqlx::query(
        r#"SELECT id, email, name, created_at FROM users WHERE email = $1"#,
    )
    .bind(&user.email)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("get_profile db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(row) = row else {
        return HttpResponse::NotFound()
            .json(json!({ "success": false, "message": "User not found" }));
    };

    let id: i32 = row.get("id");
    let email: String = row.get("email");
    let name: Option<String> = row.get("name");
    let created_at: DateTime<Utc> = row.get("created_at");

    HttpResponse::Ok().json(json!({
        "success": true,
        "user": { "id": id, "email": email, "name": name, "created_at": created_at },
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileBody {
    pub name: String,
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = UpdateProfileBody,
    responses((status = 200, description = "Profile updated")),
    tag = "users"
)]
#[put("/users/profile")]
pub async fn update_profile(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<UpdateProfileBody>,
) -> impl Responder {
    let name = payload.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Name is required" }));
    }

    if let Err(e) = sqlx::query("UPDATE users SET name = $1 WHERE email = $2")
        .bind(name)
        .bind(&user.email)
        .execute(&state.pool)
        .await
    {
        eprintln!("update_profile db error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "user": { "email": user.email, "name": name },
    }))
}
