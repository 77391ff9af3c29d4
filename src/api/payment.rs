// src/api/payment.rs

use actix_web::{get, post, web, HttpResponse, Responder};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;
use utoipa::ToSchema;

use crate::api::auth::AuthUser;
use crate::api::razorpay;
use crate::entitlement::{self, RecordOutcome, ViewDecision};
use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/payment/plans",
    responses((status = 200, description = "Active plans, price ascending")),
    tag = "payment"
)]
#[get("/payment/plans")]
pub async fn list_plans(state: web::Data<AppState>) -> impl Responder {
    match db::list_active_plans(&state.pool).await {
        Ok(plans) => HttpResponse::Ok().json(json!({ "success": true, "plans": plans })),
        Err(e) => {
            eprintln!("list_plans db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/payment/my-purchases",
    responses((status = 200, description = "Viewer's active purchases, newest first")),
    tag = "payment"
)]
#[get("/payment/my-purchases")]
pub async fn my_purchases(user: web::ReqData<AuthUser>, state: web::Data<AppState>) -> impl Responder {
    let purchases = match db::list_active_purchases(&state.pool, &user.email).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("my_purchases db error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let active = entitlement::pick_active_purchase(&purchases);

    HttpResponse::Ok().json(json!({
        "success": true,
        "purchases": purchases,
        "hasActivePlan": active.is_some(),
        "activePlan": active,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderBody {
    pub plan_id: i32,
}

#[utoipa::path(
    post,
    path = "/api/payment/create-order",
    request_body = CreateOrderBody,
    responses((status = 200, description = "Razorpay order created")),
    tag = "payment"
)]
#[post("/payment/create-order")]
pub async fn create_order(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<CreateOrderBody>,
) -> impl Responder {
    let plan = match db::get_active_plan(&state.pool, payload.plan_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(json!({ "success": false, "message": "Plan not found" }))
        }
        Err(e) => {
            eprintln!("create_order get plan error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(amount) = razorpay::amount_to_paise(&plan.price) else {
        eprintln!("create_order bad price for plan {}: {}", plan.plan_id, plan.price);
        return HttpResponse::InternalServerError().finish();
    };

    let receipt = format!("receipt_{}", Utc::now().timestamp_millis());
    let order = match razorpay::create_order(
        &state.config.razorpay_key_id,
        &state.config.razorpay_key_secret,
        razorpay::CreateOrderRequest {
            amount,
            currency: "INR".to_string(),
            receipt,
            notes: json!({
                "user_email": user.email,
                "plan_id": plan.plan_id,
                "plan_name": plan.plan_name,
            }),
        },
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            log::error!("razorpay create_order error: {e} email={}", user.email);
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to create order" }));
        }
    };

    if let Err(e) = sqlx::query(
        r#"INSERT INTO transactions (razorpay_order_id, user_email, plan_id, amount, currency, status)
           VALUES ($1, $2, $3, $4::numeric, 'INR', 'created')"#,
    )
    .bind(&order.id)
    .bind(&user.email)
    .bind(plan.plan_id)
    .bind(&plan.price)
    .execute(&state.pool)
    .await
    {
        eprintln!("create_order insert tx error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "order": { "id": order.id, "amount": order.amount, "currency": order.currency },
        "plan": {
            "id": plan.plan_id,
            "name": plan.plan_name,
            "type": plan.plan_type,
            "price": plan.price,
        },
        "key_id": state.config.razorpay_key_id,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentBody {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[utoipa::path(
    post,
    path = "/api/payment/verify-payment",
    request_body = VerifyPaymentBody,
    responses(
        (status = 200, description = "Payment verified, purchase created"),
        (status = 400, description = "Invalid signature"),
        (status = 403, description = "Order belongs to a different user"),
    ),
    tag = "payment"
)]
#[post("/payment/verify-payment")]
pub async fn verify_payment(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<VerifyPaymentBody>,
) -> impl Responder {
    let valid = razorpay::verify_payment_signature(
        &state.config.razorpay_key_secret,
        &payload.razorpay_order_id,
        &payload.razorpay_payment_id,
        &payload.razorpay_signature,
    );

    if !valid {
        let _ = sqlx::query(
            r#"UPDATE transactions SET status = 'failed', error_message = 'Invalid signature'
               WHERE razorpay_order_id = $1"#,
        )
        .bind(&payload.razorpay_order_id)
        .execute(&state.pool)
        .await;

        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Invalid payment signature" }));
    }

    let tx_row = match sqlx::query(
        r#"SELECT id, user_email, plan_id, amount::text as amount, status
           FROM transactions
           WHERE razorpay_order_id = $1"#,
    )
    .bind(&payload.razorpay_order_id)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("verify_payment select tx error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let Some(tx_row) = tx_row else {
        return HttpResponse::NotFound()
            .json(json!({ "success": false, "message": "Transaction not found" }));
    };

    let tx_email: String = tx_row.get("user_email");
    if tx_email != user.email {
        log::warn!(
            "verify_payment ownership mismatch: order {} belongs to {tx_email}, caller {}",
            payload.razorpay_order_id,
            user.email
        );
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "message": "Transaction does not belong to this user" }));
    }

    let tx_status: String = tx_row.get("status");
    if tx_status == "success" {
        // Replayed verification: the purchase already exists.
        return HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Payment already verified",
        }));
    }

    let plan_id: i32 = tx_row.get("plan_id");
    let amount: String = tx_row.get("amount");

    let plan = match db::get_active_plan(&state.pool, plan_id).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(json!({ "success": false, "message": "Plan not found" }))
        }
        Err(e) => {
            eprintln!("verify_payment get plan error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query(
        r#"UPDATE transactions
           SET status = 'success', razorpay_payment_id = $1, razorpay_signature = $2
           WHERE razorpay_order_id = $3"#,
    )
    .bind(&payload.razorpay_payment_id)
    .bind(&payload.razorpay_signature)
    .bind(&payload.razorpay_order_id)
    .execute(&state.pool)
    .await
    {
        eprintln!("verify_payment update tx error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    // Premium never expires through time; metered plans run for a year.
    let expiry_date = if plan.plan_type == "premium" {
        None
    } else {
        Some(Utc::now() + Duration::days(365))
    };

    let purchase_id = match db::insert_purchase(
        &state.pool,
        &user.email,
        plan.plan_id,
        &payload.razorpay_order_id,
        &amount,
        plan.views_limit,
        expiry_date,
    )
    .await
    {
        Ok(id) => id,
        Err(e) => {
            eprintln!("verify_payment insert purchase error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "purchase": {
            "purchase_id": purchase_id,
            "plan_name": plan.plan_name,
            "plan_type": plan.plan_type,
            "views_remaining": plan.views_limit,
        }
    }))
}

#[utoipa::path(
    get,
    path = "/api/payment/can-view/{roll_no}",
    params(("roll_no" = String, Path, description = "Target student roll number")),
    responses((status = 200, description = "Whether the viewer may see this result")),
    tag = "payment"
)]
#[get("/payment/can-view/{roll_no}")]
pub async fn can_view(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let roll_no = path.into_inner();

    let decision = match entitlement::can_view(
        &state.pool,
        &state.config.student_batch,
        &user.email,
        &roll_no,
    )
    .await
    {
        Ok(d) => d,
        Err(e) => {
            eprintln!("can_view evaluator error: {e}");
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to check permission" }));
        }
    };

    match decision {
        ViewDecision::OwnResult => HttpResponse::Ok().json(json!({
            "success": true,
            "canView": true,
            "ownResult": true,
            "message": "Viewing your own result",
        })),
        ViewDecision::AlreadyViewed { purchase } => HttpResponse::Ok().json(json!({
            "success": true,
            "canView": true,
            "alreadyViewed": true,
            "purchase": purchase,
        })),
        ViewDecision::FreshView { purchase } => HttpResponse::Ok().json(json!({
            "success": true,
            "canView": true,
            "alreadyViewed": false,
            "purchase": purchase,
        })),
        ViewDecision::NoActivePlan => HttpResponse::Ok().json(json!({
            "success": true,
            "canView": false,
            "reason": "no_active_plan",
            "message": "Please purchase a plan to view results",
        })),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordViewBody {
    pub roll_no: String,
}

#[utoipa::path(
    post,
    path = "/api/payment/record-view",
    request_body = RecordViewBody,
    responses(
        (status = 200, description = "View recorded (or free/idempotent)"),
        (status = 403, description = "No active plan"),
    ),
    tag = "payment"
)]
#[post("/payment/record-view")]
pub async fn record_view(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<RecordViewBody>,
) -> impl Responder {
    let roll_no = payload.roll_no.trim();
    if roll_no.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "Roll number is required" }));
    }

    let outcome = match entitlement::record_view(
        &state.pool,
        &state.config.student_batch,
        &user.email,
        roll_no,
    )
    .await
    {
        Ok(o) => o,
        Err(e) => {
            eprintln!("record_view evaluator error: {e}");
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to record view" }));
        }
    };

    match outcome {
        RecordOutcome::OwnResult => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Own result viewed",
            "ownResult": true,
        })),
        RecordOutcome::AlreadyViewed { views_remaining } => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Already viewed",
            "viewsRemaining": views_remaining,
        })),
        RecordOutcome::Recorded { views_remaining } => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "View recorded",
            "viewsRemaining": views_remaining,
        })),
        RecordOutcome::NoActivePlan => HttpResponse::Forbidden().json(json!({
            "success": false,
            "message": "No active plan found",
        })),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PremiumRequestBody {
    pub request_type: String,
    pub subject: String,
    pub description: String,
}

#[utoipa::path(
    post,
    path = "/api/payment/premium-request",
    request_body = PremiumRequestBody,
    responses(
        (status = 200, description = "Request submitted"),
        (status = 403, description = "Premium plan required"),
    ),
    tag = "payment"
)]
#[post("/payment/premium-request")]
pub async fn premium_request(
    user: web::ReqData<AuthUser>,
    state: web::Data<AppState>,
    payload: web::Json<PremiumRequestBody>,
) -> impl Responder {
    if payload.request_type.trim().is_empty()
        || payload.subject.trim().is_empty()
        || payload.description.trim().is_empty()
    {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "message": "All fields are required" }));
    }

    let has_premium = match sqlx::query(
        r#"SELECT p.purchase_id
           FROM purchases p
           JOIN plans pl ON pl.plan_id = p.plan_id
           WHERE p.user_email = $1 AND p.is_active = TRUE AND pl.plan_type = 'premium'
           ORDER BY p.purchase_date DESC
           LIMIT 1"#,
    )
    .bind(&user.email)
    .fetch_optional(&state.pool)
    .await
    {
        Ok(r) => r.is_some(),
        Err(e) => {
            eprintln!("premium_request select error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if !has_premium {
        return HttpResponse::Forbidden()
            .json(json!({ "success": false, "message": "Premium plan required" }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO premium_requests (user_email, request_type, subject, description)
           VALUES ($1, $2, $3, $4)
           RETURNING id"#,
    )
    .bind(&user.email)
    .bind(payload.request_type.trim())
    .bind(payload.subject.trim())
    .bind(payload.description.trim())
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("premium_request insert error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let request_id: i32 = row.get("id");

    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Request submitted successfully",
        "request_id": request_id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payment/my-requests",
    responses((status = 200, description = "Viewer's premium requests, newest first")),
    tag = "payment"
)]
#[get("/payment/my-requests")]
pub async fn my_requests(user: web::ReqData<AuthUser>, state: web::Data<AppState>) -> impl Responder {
    let requests = match sqlx::query_as::<_, crate::models::PremiumRequest>(
        r#"SELECT id, user_email, request_type, subject, description, status, created_at
           FROM premium_requests
           WHERE user_email = $1
           ORDER BY created_at DESC"#,
    )
    .bind(&user.email)
    .fetch_all(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("my_requests select error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    HttpResponse::Ok().json(json!({ "success": true, "requests": requests }))
}
