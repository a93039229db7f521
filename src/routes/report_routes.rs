use std::sync::Mutex;

use actix_web::{get, post, web, Responder};
use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use tracing::info;

use super::{error_reply, png_reply, render_png, stored_record};
use crate::fields::{ReportRecord, UNKNOWN_SAMPLE};
use crate::templates::ReportTemplate;
use crate::uploads::UploadStore;

/// Direct render request. Missing values take the same defaults as an
/// unresolved table column.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub sample_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub thc: f64,
    #[serde(default)]
    pub cbd: f64,
    #[serde(default)]
    pub moisture: f64,
    #[serde(default)]
    pub water_activity: f64,
}

impl ReportRequest {
    pub fn into_record(self) -> ReportRecord {
        ReportRecord {
            sample_name: self
                .sample_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SAMPLE.to_string()),
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().fixed_offset()),
            thc: self.thc,
            cbd: self.cbd,
            moisture: self.moisture,
            water_activity: self.water_activity,
        }
    }
}

#[post("/reports")]
pub async fn create_report(
    template: web::Data<ReportTemplate>,
    body: web::Json<ReportRequest>,
) -> impl Responder {
    let record = body.into_inner().into_record();
    info!("Rendering report for {}", record.sample_name);

    match render_png(template, record).await {
        Ok(png) => png_reply(png),
        Err(e) => error_reply(&e),
    }
}

#[get("/uploads/{key}/rows/{row}/report")]
pub async fn row_report(
    path: web::Path<(String, usize)>,
    uploads: web::Data<Mutex<UploadStore>>,
    template: web::Data<ReportTemplate>,
) -> impl Responder {
    let (key, row) = path.into_inner();

    let record = match stored_record(&uploads, &key, row) {
        Ok(record) => record,
        Err(e) => return error_reply(&e),
    };
    info!("Rendering report for {} (row {} of {})", record.sample_name, row, key);

    match render_png(template, record).await {
        Ok(png) => png_reply(png),
        Err(e) => error_reply(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::UploadedTable;
    use actix_web::{test, App};
    use std::collections::HashMap;

    fn store_with_row() -> (web::Data<Mutex<UploadStore>>, String) {
        let mut store = UploadStore::default();
        let row: HashMap<String, String> = [
            ("Sample_ID", "Sample-042"),
            ("THC_Content", "18.5"),
            ("Created_At", "2024-03-01T10:00:00Z"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let key = store
            .insert(
                7,
                UploadedTable {
                    file_name: "a.csv".to_string(),
                    headers: vec![
                        "Sample_ID".to_string(),
                        "THC_Content".to_string(),
                        "Created_At".to_string(),
                    ],
                    rows: vec![row],
                },
            )
            .unwrap();
        (web::Data::new(Mutex::new(store)), key)
    }

    #[actix_web::test]
    async fn test_direct_report_is_png() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ReportTemplate::default()))
                .service(create_report),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/reports")
            .set_json(serde_json::json!({
                "sample_name": "Sample-042",
                "timestamp": "2024-03-01T10:00:00Z",
                "thc": 18.5,
                "cbd": 0.7,
                "moisture": 8.23,
                "water_activity": 0.612
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "image/png"
        );

        let body = test::read_body(resp).await;
        let image = image::load_from_memory(&body).unwrap();
        assert_eq!(image.width(), 576);
    }

    #[actix_web::test]
    async fn test_row_report_renders_stored_row() {
        let (uploads, key) = store_with_row();
        let app = test::init_service(
            App::new()
                .app_data(uploads)
                .app_data(web::Data::new(ReportTemplate::default()))
                .service(row_report),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/uploads/{}/rows/0/report", key))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_row_report_unknown_upload_is_not_found() {
        let (uploads, key) = store_with_row();
        let app = test::init_service(
            App::new()
                .app_data(uploads)
                .app_data(web::Data::new(ReportTemplate::default()))
                .service(row_report),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/uploads/7_999/rows/0/report")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::get()
            .uri(&format!("/uploads/{}/rows/3/report", key))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["error_type"], "upload_error");
    }

    #[actix_web::test]
    async fn test_request_defaults() {
        let request: ReportRequest = serde_json::from_str(r#"{"sample_name": "  "}"#).unwrap();
        let record = request.into_record();
        assert_eq!(record.sample_name, "Unbekannt");
        assert_eq!(record.thc, 0.0);
    }
}
