// src/api/results.rs

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/results/{roll_no}",
    params(("roll_no" = String, Path, description = "Student roll number")),
    responses(
        (status = 200, description = "Course rows for the student"),
        (status = 404, description = "No results for this roll number"),
    ),
    tag = "results"
)]
#[get("/results/{roll_no}")]
pub async fn get_results(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let roll_no = path.into_inner();

    let results = match db::list_results_for_roll(
        &state.pool,
        &state.config.student_batch,
        &roll_no,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("get_results db error: {e}");
            return HttpResponse::InternalServerError()
                .json(json!({ "success": false, "message": "Failed to fetch results" }));
        }
    };

    if results.is_empty() {
        return HttpResponse::NotFound().json(json!({
            "success": false,
            "message": "No results found for this student",
        }));
    }

    HttpResponse::Ok().json(json!({ "success": true, "results": results }))
}
