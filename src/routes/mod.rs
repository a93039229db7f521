// Route modules organization

pub mod printer_routes;
pub mod report_routes;
pub mod upload_routes;

// Re-export all routes for convenience
pub use printer_routes::*;
pub use report_routes::*;
pub use upload_routes::*;

use std::sync::Mutex;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use tracing::warn;

use crate::errors::AppError;
use crate::fields::ReportRecord;
use crate::templates::ReportTemplate;
use crate::uploads::UploadStore;

/// JSON error body with the status code matching the error kind.
pub fn error_reply(err: &AppError) -> HttpResponse {
    warn!("Request failed: {}", err);
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(err.error_response())
}

fn png_reply(png: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok().content_type("image/png").body(png)
}

fn stored_record(
    uploads: &Mutex<UploadStore>,
    key: &str,
    row: usize,
) -> Result<ReportRecord, AppError> {
    let store = uploads
        .lock()
        .map_err(|_| AppError::Web("upload store is unavailable".to_string()))?;
    Ok(store.record(key, row)?)
}

/// Renders on the blocking pool.
async fn render_png(
    template: web::Data<ReportTemplate>,
    record: ReportRecord,
) -> Result<Vec<u8>, AppError> {
    let png = web::block(move || template.render(&record))
        .await
        .map_err(|e| AppError::Web(format!("render task failed: {}", e)))??;
    Ok(png)
}
