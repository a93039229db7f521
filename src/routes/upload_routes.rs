use std::sync::Mutex;

use actix_web::{post, web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;

use super::error_reply;
use crate::errors::AppError;
use crate::table::TablePreview;
use crate::uploads::{UploadStore, UploadedTable};

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub chat_id: i64,
    #[serde(flatten)]
    pub table: UploadedTable,
}

#[post("/uploads")]
pub async fn upload_table(
    uploads: web::Data<Mutex<UploadStore>>,
    body: web::Json<UploadRequest>,
) -> impl Responder {
    let UploadRequest { chat_id, table } = body.into_inner();
    info!(
        "Upload from chat {}: {} ({} rows)",
        chat_id,
        table.file_name,
        table.rows.len()
    );

    let preview = TablePreview::build(&table);
    let key = match uploads.lock() {
        Ok(mut store) => store.insert(chat_id, table).map_err(AppError::from),
        Err(_) => Err(AppError::Web("upload store is unavailable".to_string())),
    };

    match key {
        Ok(key) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "key": key,
            "message": preview.to_string(),
            "preview": preview,
        })),
        Err(e) => error_reply(&e),
    }
}
