use std::sync::Mutex;

use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::{error, info};

use super::{error_reply, render_png, stored_record};
use crate::errors::AppError;
use crate::printers::PrintTransmitter;
use crate::templates::ReportTemplate;
use crate::uploads::UploadStore;

#[post("/uploads/{key}/rows/{row}/print")]
pub async fn print_row(
    path: web::Path<(String, usize)>,
    uploads: web::Data<Mutex<UploadStore>>,
    template: web::Data<ReportTemplate>,
    transmitter: web::Data<PrintTransmitter>,
) -> impl Responder {
    let (key, row) = path.into_inner();
    info!("Print request for row {} of {}", row, key);

    let record = match stored_record(&uploads, &key, row) {
        Ok(record) => record,
        Err(e) => return error_reply(&e),
    };
    let sample_name = record.sample_name.clone();

    // Printing needs a finished render, so a render failure ends here.
    let png = match render_png(template, record).await {
        Ok(png) => png,
        Err(e) => {
            error!("Failed to render report for printing: {}", e);
            return error_reply(&e);
        }
    };

    match transmitter.print(&png, &sample_name).await {
        Ok(state) => HttpResponse::Ok().json(serde_json::json!({
            "ok": true,
            "state": state,
            "sample_name": sample_name,
            "message": format!("Bericht für {} wurde gedruckt", sample_name),
        })),
        Err(e) => error_reply(&AppError::from(e)),
    }
}

#[get("/printer/status")]
pub async fn printer_status(transmitter: web::Data<PrintTransmitter>) -> impl Responder {
    let status = transmitter.status().await;
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "status": status,
    }))
}
