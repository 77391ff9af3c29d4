use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::json;
use sqlx::{PgPool, Row};

use result_portal_backend::api;
use result_portal_backend::api::auth::generate_jwt;
use result_portal_backend::api::razorpay::payment_signature;
use result_portal_backend::db;
use result_portal_backend::entitlement::{self, RecordOutcome, ViewDecision};

mod support;

const BATCH: &str = "2428";

async fn seed_student(pool: &PgPool, roll_no: &str, email: &str) {
    sqlx::query(
        r#"INSERT INTO students (batch, roll_no, student_email, student_name)
           VALUES ($1, $2, $3, 'Test Student')"#,
    )
    .bind(BATCH)
    .bind(roll_no)
    .bind(email)
    .execute(pool)
    .await
    .expect("insert student");
}

async fn seed_plan(pool: &PgPool, plan_type: &str, views_limit: Option<i32>) -> i32 {
    sqlx::query(
        r#"INSERT INTO plans (plan_name, plan_type, price, views_limit)
           VALUES ('Test Plan', $1, 49.00, $2)
           RETURNING plan_id"#,
    )
    .bind(plan_type)
    .bind(views_limit)
    .fetch_one(pool)
    .await
    .expect("insert plan")
    .get("plan_id")
}

async fn seed_purchase(
    pool: &PgPool,
    email: &str,
    plan_id: i32,
    views_remaining: Option<i32>,
) -> i32 {
    sqlx::query(
        r#"INSERT INTO purchases
               (user_email, plan_id, transaction_id, amount_paid, views_remaining)
           VALUES ($1, $2, $3, 49.00, $4)
           RETURNING purchase_id"#,
    )
    .bind(email)
    .bind(plan_id)
    .bind(format!("order_test_{plan_id}"))
    .bind(views_remaining)
    .fetch_one(pool)
    .await
    .expect("insert purchase")
    .get("purchase_id")
}

async fn purchase_state(pool: &PgPool, purchase_id: i32) -> (Option<i32>, bool) {
    let row = sqlx::query("SELECT views_remaining, is_active FROM purchases WHERE purchase_id = $1")
        .bind(purchase_id)
        .fetch_one(pool)
        .await
        .expect("select purchase");
    (row.get("views_remaining"), row.get("is_active"))
}

async fn view_count(pool: &PgPool, email: &str) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM result_views WHERE user_email = $1")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("count views")
        .get("n")
}

#[actix_web::test]
async fn self_view_is_free_even_without_purchases() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "own@student.test";
    seed_student(pool, "R100", viewer).await;

    let decision = entitlement::can_view(pool, BATCH, viewer, "R100")
        .await
        .expect("can_view");
    assert!(matches!(decision, ViewDecision::OwnResult));

    let outcome = entitlement::record_view(pool, BATCH, viewer, "R100")
        .await
        .expect("record_view");
    assert!(matches!(outcome, RecordOutcome::OwnResult));

    // Nothing recorded, no purchase needed or touched.
    assert_eq!(view_count(pool, viewer).await, 0);
}

#[actix_web::test]
async fn no_purchase_means_no_active_plan_for_other_results() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    seed_student(pool, "R200", "someone.else@student.test").await;

    let decision = entitlement::can_view(pool, BATCH, "viewer@student.test", "R200")
        .await
        .expect("can_view");
    assert!(matches!(decision, ViewDecision::NoActivePlan));

    let outcome = entitlement::record_view(pool, BATCH, "viewer@student.test", "R200")
        .await
        .expect("record_view");
    assert!(matches!(outcome, RecordOutcome::NoActivePlan));
}

#[actix_web::test]
async fn record_view_is_idempotent() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "idem@student.test";
    seed_student(pool, "R1", "other@student.test").await;
    let plan_id = seed_plan(pool, "metered", Some(2)).await;
    let purchase_id = seed_purchase(pool, viewer, plan_id, Some(2)).await;

    let first = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("first record");
    assert!(matches!(
        first,
        RecordOutcome::Recorded {
            views_remaining: Some(1)
        }
    ));

    let second = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("second record");
    assert!(matches!(
        second,
        RecordOutcome::AlreadyViewed {
            views_remaining: Some(1)
        }
    ));

    // One row, one decrement.
    assert_eq!(view_count(pool, viewer).await, 1);
    let (remaining, active) = purchase_state(pool, purchase_id).await;
    assert_eq!(remaining, Some(1));
    assert!(active);

    // A check after recording reports already-viewed, still free.
    let decision = entitlement::can_view(pool, BATCH, viewer, "R1")
        .await
        .expect("can_view");
    assert!(matches!(decision, ViewDecision::AlreadyViewed { .. }));
}

#[actix_web::test]
async fn quota_exhaustion_deactivates_purchase() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "quota@student.test";
    seed_student(pool, "R1", "a@student.test").await;
    seed_student(pool, "R2", "b@student.test").await;
    seed_student(pool, "R3", "c@student.test").await;
    let plan_id = seed_plan(pool, "metered", Some(2)).await;
    let purchase_id = seed_purchase(pool, viewer, plan_id, Some(2)).await;

    let r1 = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("record R1");
    assert!(matches!(
        r1,
        RecordOutcome::Recorded {
            views_remaining: Some(1)
        }
    ));

    // Retry of R1 does not double-decrement.
    let r1_again = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("record R1 again");
    assert!(matches!(
        r1_again,
        RecordOutcome::AlreadyViewed {
            views_remaining: Some(1)
        }
    ));

    // Last view: quota hits the floor and the purchase goes terminal.
    let r2 = entitlement::record_view(pool, BATCH, viewer, "R2")
        .await
        .expect("record R2");
    assert!(matches!(
        r2,
        RecordOutcome::Recorded {
            views_remaining: Some(0)
        }
    ));

    let (remaining, active) = purchase_state(pool, purchase_id).await;
    assert_eq!(remaining, Some(0));
    assert!(!active);

    // Exhausted purchase is never selected again.
    let decision = entitlement::can_view(pool, BATCH, viewer, "R3")
        .await
        .expect("can_view R3");
    assert!(matches!(decision, ViewDecision::NoActivePlan));
}

#[actix_web::test]
async fn unlimited_plan_is_never_decremented() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "premium@student.test";
    seed_student(pool, "R1", "a@student.test").await;
    seed_student(pool, "R2", "b@student.test").await;
    let plan_id = seed_plan(pool, "premium", None).await;
    let purchase_id = seed_purchase(pool, viewer, plan_id, None).await;

    for roll in ["R1", "R2"] {
        let outcome = entitlement::record_view(pool, BATCH, viewer, roll)
            .await
            .expect("record");
        assert!(matches!(
            outcome,
            RecordOutcome::Recorded {
                views_remaining: None
            }
        ));
    }

    let (remaining, active) = purchase_state(pool, purchase_id).await;
    assert_eq!(remaining, None);
    assert!(active);
    assert_eq!(view_count(pool, viewer).await, 2);
}

#[actix_web::test]
async fn record_view_consumes_most_recent_purchase() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "recency@student.test";
    seed_student(pool, "R1", "a@student.test").await;
    let plan_id = seed_plan(pool, "metered", Some(5)).await;
    let older = seed_purchase(pool, viewer, plan_id, Some(5)).await;
    let newer = seed_purchase(pool, viewer, plan_id, Some(5)).await;

    // Make the ordering unambiguous.
    sqlx::query(
        "UPDATE purchases SET purchase_date = NOW() - INTERVAL '1 day' WHERE purchase_id = $1",
    )
    .bind(older)
    .execute(pool)
    .await
    .expect("backdate older purchase");

    let outcome = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("record");
    assert!(matches!(outcome, RecordOutcome::Recorded { .. }));

    let recorded_purchase: i32 = sqlx::query(
        "SELECT purchase_id FROM result_views WHERE user_email = $1 AND viewed_roll_no = 'R1'",
    )
    .bind(viewer)
    .fetch_one(pool)
    .await
    .expect("select view row")
    .get("purchase_id");
    assert_eq!(recorded_purchase, newer);

    let (older_remaining, _) = purchase_state(pool, older).await;
    assert_eq!(older_remaining, Some(5));
    let (newer_remaining, _) = purchase_state(pool, newer).await;
    assert_eq!(newer_remaining, Some(4));
}

#[actix_web::test]
async fn duplicate_view_insert_is_swallowed_not_an_error() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "race@student.test";
    seed_student(pool, "R1", "other@student.test").await;
    let plan_id = seed_plan(pool, "metered", Some(2)).await;
    let purchase_id = seed_purchase(pool, viewer, plan_id, Some(2)).await;

    // Two inserts of the same triple, as two concurrent records would
    // produce: one winner, one no-op. The second must not surface the
    // unique constraint as an error.
    let first = db::insert_result_view(pool, viewer, "R1", purchase_id)
        .await
        .expect("first insert");
    assert!(first);
    let second = db::insert_result_view(pool, viewer, "R1", purchase_id)
        .await
        .expect("second insert");
    assert!(!second);
    assert_eq!(view_count(pool, viewer).await, 1);

    // The evaluator treats the existing row as already-viewed and does
    // not charge again.
    let outcome = entitlement::record_view(pool, BATCH, viewer, "R1")
        .await
        .expect("record");
    assert!(matches!(outcome, RecordOutcome::AlreadyViewed { .. }));
    let (remaining, active) = purchase_state(pool, purchase_id).await;
    assert_eq!(remaining, Some(2));
    assert!(active);
}

#[actix_web::test]
async fn can_view_endpoint_reports_own_result() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "http@student.test";
    seed_student(pool, "R900", viewer).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .wrap(api::auth::JwtMiddleware)
                .service(api::payment::can_view),
        ),
    )
    .await;

    let token = generate_jwt("test-secret", viewer, 7).expect("token");
    let req = TestRequest::get()
        .uri("/api/payment/can-view/R900")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["canView"], true);
    assert_eq!(body["ownResult"], true);
}

#[actix_web::test]
async fn record_view_endpoint_forbids_without_plan() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "broke@student.test";
    seed_student(pool, "R901", "other@student.test").await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .wrap(api::auth::JwtMiddleware)
                .service(api::payment::record_view),
        ),
    )
    .await;

    let token = generate_jwt("test-secret", viewer, 7).expect("token");
    let req = TestRequest::post()
        .uri("/api/payment/record-view")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "roll_no": "R901" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No active plan found");
    assert_eq!(view_count(pool, viewer).await, 0);
}

#[actix_web::test]
async fn record_view_endpoint_reports_views_remaining() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let viewer = "payer@student.test";
    seed_student(pool, "R902", "other@student.test").await;
    let plan_id = seed_plan(pool, "metered", Some(3)).await;
    seed_purchase(pool, viewer, plan_id, Some(3)).await;

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .wrap(api::auth::JwtMiddleware)
                .service(api::payment::record_view),
        ),
    )
    .await;

    let token = generate_jwt("test-secret", viewer, 7).expect("token");
    let req = TestRequest::post()
        .uri("/api/payment/record-view")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "roll_no": "R902" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "View recorded");
    assert_eq!(body["viewsRemaining"], 2);

    // Replaying the same view keeps the count where it is.
    let req = TestRequest::post()
        .uri("/api/payment/record-view")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({ "roll_no": "R902" }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Already viewed");
    assert_eq!(body["viewsRemaining"], 2);
}

#[actix_web::test]
async fn verify_payment_rejects_other_users_order() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let plan_id = seed_plan(pool, "metered", Some(5)).await;

    let owner = "owner@student.test";
    let intruder = "intruder@student.test";
    let order_id = "order_owned_by_someone_else";

    sqlx::query(
        r#"INSERT INTO transactions (razorpay_order_id, user_email, plan_id, amount, currency, status)
           VALUES ($1, $2, $3, 49.00, 'INR', 'created')"#,
    )
    .bind(order_id)
    .bind(owner)
    .bind(plan_id)
    .execute(pool)
    .await
    .expect("insert transaction");

    let state = web::Data::new(support::build_state(test_db.pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(
            web::scope("/api")
                .wrap(api::auth::JwtMiddleware)
                .service(api::payment::verify_payment),
        ),
    )
    .await;

    // Valid signature, wrong caller: the order is not theirs to verify.
    let signature = payment_signature("rzp_test_secret", order_id, "pay_hijack");
    let token = generate_jwt("test-secret", intruder, 7).expect("token");
    let req = TestRequest::post()
        .uri("/api/payment/verify-payment")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(json!({
            "razorpay_order_id": order_id,
            "razorpay_payment_id": "pay_hijack",
            "razorpay_signature": signature,
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    // No purchase created for anyone, transaction untouched.
    let purchases: i64 = sqlx::query("SELECT COUNT(*) AS n FROM purchases")
        .fetch_one(pool)
        .await
        .expect("count purchases")
        .get("n");
    assert_eq!(purchases, 0);

    let status: String = sqlx::query("SELECT status FROM transactions WHERE razorpay_order_id = $1")
        .bind(order_id)
        .fetch_one(pool)
        .await
        .expect("select tx")
        .get("status");
    assert_eq!(status, "created");
}
