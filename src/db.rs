// src/db.rs

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::models::{CourseResult, Plan, Purchase, ResultView, StudentRecord};

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<Plan>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT plan_id, plan_name, plan_type, price::text as price, views_limit,
                  features, is_active
           FROM plans
           WHERE is_active = TRUE
           ORDER BY price ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Plan {
            plan_id: r.get("plan_id"),
            plan_name: r.get("plan_name"),
            plan_type: r.get("plan_type"),
            price: r.get("price"),
            views_limit: r.get("views_limit"),
            features: r.get("features"),
            is_active: r.get("is_active"),
        })
        .collect())
}

pub async fn get_active_plan(pool: &PgPool, plan_id: i32) -> Result<Option<Plan>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT plan_id, plan_name, plan_type, price::text as price, views_limit,
                  features, is_active
           FROM plans
           WHERE plan_id = $1 AND is_active = TRUE"#,
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Plan {
        plan_id: r.get("plan_id"),
        plan_name: r.get("plan_name"),
        plan_type: r.get("plan_type"),
        price: r.get("price"),
        views_limit: r.get("views_limit"),
        features: r.get("features"),
        is_active: r.get("is_active"),
    }))
}

/// Student lookup against the single logical collection keyed by
/// (batch, roll_no). The batch comes from config, never from the URL.
pub async fn find_student_by_roll(
    pool: &PgPool,
    batch: &str,
    roll_no: &str,
) -> Result<Option<StudentRecord>, sqlx::Error> {
    sqlx::query_as::<_, StudentRecord>(
        r#"SELECT batch, roll_no, student_email, student_name
           FROM students
           WHERE batch = $1 AND roll_no = $2"#,
    )
    .bind(batch)
    .bind(roll_no)
    .fetch_optional(pool)
    .await
}

pub async fn list_results_for_roll(
    pool: &PgPool,
    batch: &str,
    roll_no: &str,
) -> Result<Vec<CourseResult>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT course_code, course_title,
                  marks_midterm::text as marks_midterm,
                  marks_endterm::text as marks_endterm,
                  grade, sgpa::text as sgpa, remarks
           FROM results
           WHERE batch = $1 AND roll_no = $2
           ORDER BY course_code ASC"#,
    )
    .bind(batch)
    .bind(roll_no)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CourseResult {
            course_code: r.get("course_code"),
            course_title: r.get("course_title"),
            marks_midterm: r.get("marks_midterm"),
            marks_endterm: r.get("marks_endterm"),
            grade: r.get("grade"),
            sgpa: r.get("sgpa"),
            remarks: r.get("remarks"),
        })
        .collect())
}

/// Most-recent active purchase with quota available, or None.
/// Eligibility lives in the WHERE clause so every caller sees the same rule.
pub async fn find_eligible_purchase(
    pool: &PgPool,
    viewer_email: &str,
) -> Result<Option<Purchase>, sqlx::Error> {
    sqlx::query_as::<_, Purchase>(
        r#"SELECT purchase_id, user_email, plan_id, transaction_id,
                  views_remaining, is_active, purchase_date, expiry_date
           FROM purchases
           WHERE user_email = $1 AND is_active = TRUE
             AND (views_remaining > 0 OR views_remaining IS NULL)
           ORDER BY purchase_date DESC
           LIMIT 1"#,
    )
    .bind(viewer_email)
    .fetch_optional(pool)
    .await
}

pub async fn list_active_purchases(
    pool: &PgPool,
    viewer_email: &str,
) -> Result<Vec<Purchase>, sqlx::Error> {
    sqlx::query_as::<_, Purchase>(
        r#"SELECT purchase_id, user_email, plan_id, transaction_id,
                  views_remaining, is_active, purchase_date, expiry_date
           FROM purchases
           WHERE user_email = $1 AND is_active = TRUE
           ORDER BY purchase_date DESC"#,
    )
    .bind(viewer_email)
    .fetch_all(pool)
    .await
}

pub async fn find_result_view(
    pool: &PgPool,
    viewer_email: &str,
    roll_no: &str,
    purchase_id: i32,
) -> Result<Option<ResultView>, sqlx::Error> {
    sqlx::query_as::<_, ResultView>(
        r#"SELECT id, user_email, viewed_roll_no, purchase_id, viewed_at
           FROM result_views
           WHERE user_email = $1 AND viewed_roll_no = $2 AND purchase_id = $3"#,
    )
    .bind(viewer_email)
    .bind(roll_no)
    .bind(purchase_id)
    .fetch_optional(pool)
    .await
}

/// Insert a view row for the (viewer, roll_no, purchase) triple. Returns
/// false when the triple already exists; the unique index makes the insert
/// a no-op instead of an error, so two concurrent records of the same view
/// resolve to one winner and one already-viewed.
pub async fn insert_result_view(
    pool: &PgPool,
    viewer_email: &str,
    roll_no: &str,
    purchase_id: i32,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO result_views (user_email, viewed_roll_no, purchase_id)
           VALUES ($1, $2, $3)
           ON CONFLICT (user_email, viewed_roll_no, purchase_id) DO NOTHING"#,
    )
    .bind(viewer_email)
    .bind(roll_no)
    .bind(purchase_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomic decrement-if-positive. Returns the new remaining count, or None
/// when nothing was updated (unlimited quota, already 0, or unknown id) —
/// quota can never go negative through this path.
pub async fn decrement_views_if_positive(
    pool: &PgPool,
    purchase_id: i32,
) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE purchases
           SET views_remaining = views_remaining - 1
           WHERE purchase_id = $1
             AND views_remaining IS NOT NULL
             AND views_remaining > 0
           RETURNING views_remaining"#,
    )
    .bind(purchase_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("views_remaining")))
}

pub async fn deactivate_purchase(pool: &PgPool, purchase_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE purchases SET is_active = FALSE WHERE purchase_id = $1")
        .bind(purchase_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Purchase creation at payment verification time. Quota is snapshotted
/// from the plan here and never re-read from `plans` afterwards.
pub async fn insert_purchase(
    pool: &PgPool,
    user_email: &str,
    plan_id: i32,
    transaction_id: &str,
    amount_paid: &str,
    views_limit: Option<i32>,
    expiry_date: Option<DateTime<Utc>>,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO purchases
               (user_email, plan_id, transaction_id, amount_paid, views_remaining, expiry_date)
           VALUES ($1, $2, $3, $4::numeric, $5, $6)
           RETURNING purchase_id"#,
    )
    .bind(user_email)
    .bind(plan_id)
    .bind(transaction_id)
    .bind(amount_paid)
    .bind(views_limit)
    .bind(expiry_date)
    .fetch_one(pool)
    .await?;

    Ok(row.get("purchase_id"))
}

pub async fn upsert_user(pool: &PgPool, email: &str) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO users (email)
           VALUES ($1)
           ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
           RETURNING id"#,
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}
