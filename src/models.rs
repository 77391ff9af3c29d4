// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Plan {
    pub plan_id: i32,
    pub plan_name: String,
    pub plan_type: String, // premium | metered
    pub price: String,
    pub views_limit: Option<i32>,
    #[schema(value_type = Object)]
    pub features: serde_json::Value,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Purchase {
    pub purchase_id: i32,
    pub user_email: String,
    pub plan_id: i32,
    pub transaction_id: String,
    pub views_remaining: Option<i32>, // NULL = unlimited
    pub is_active: bool,
    #[schema(value_type = String)]
    pub purchase_date: DateTime<Utc>,
    #[schema(value_type = Option<String>)]
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ResultView {
    pub id: i32,
    pub user_email: String,
    pub viewed_roll_no: String,
    pub purchase_id: i32,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct StudentRecord {
    pub batch: String,
    pub roll_no: String,
    pub student_email: String,
    pub student_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseResult {
    pub course_code: String,
    pub course_title: String,
    pub marks_midterm: Option<String>,
    pub marks_endterm: Option<String>,
    pub grade: Option<String>,
    pub sgpa: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct PremiumRequest {
    pub id: i32,
    pub user_email: String,
    pub request_type: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
