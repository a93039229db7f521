// Lab analysis receipt service: renders result rows and prints them on a
// network thermal printer.

use actix_web::{middleware, web, App, HttpServer};
use std::sync::Mutex;
use tracing::{error, info};

use lab_receipt::config::{self, Config};
use lab_receipt::errors::AppError;
use lab_receipt::printers::PrintTransmitter;
use lab_receipt::routes;
use lab_receipt::templates::ReportTemplate;
use lab_receipt::uploads::UploadStore;

// ============================================================================
// Application State
// ============================================================================

/// Centralized application state container
#[derive(Clone)]
pub struct AppState {
    pub template: web::Data<ReportTemplate>,
    pub uploads: web::Data<Mutex<UploadStore>>,
    pub transmitter: web::Data<PrintTransmitter>,
}

impl AppState {
    /// Create a new application state instance
    fn new(config: Config) -> Result<Self, AppError> {
        info!("Initializing application state");

        let template = ReportTemplate::from_config(&config.report);
        info!("Report typeface: {:?}", template.typeface());

        let uploads = UploadStore::new(config.uploads.per_chat_capacity);
        let transmitter = Self::initialize_printer(&config.printer)?;

        Ok(Self {
            template: web::Data::new(template),
            uploads: web::Data::new(Mutex::new(uploads)),
            transmitter: web::Data::new(transmitter),
        })
    }

    fn initialize_printer(printer: &config::PrinterConfig) -> Result<PrintTransmitter, AppError> {
        std::fs::create_dir_all(&printer.spool_dir).map_err(|e| {
            AppError::Initialization(format!(
                "Failed to create spool directory {}: {}",
                printer.spool_dir.display(),
                e
            ))
        })?;

        let transmitter = PrintTransmitter::from_config(printer).map_err(|e| {
            AppError::Initialization(format!("Failed to initialize printer: {}", e))
        })?;
        info!("Printer initialized successfully ({})", transmitter.printer().type_name());
        Ok(transmitter)
    }
}

// ============================================================================
// Shutdown Handling
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // ========================================
    // Phase 1: Basic Initialization
    // ========================================

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting lab receipt service");

    // ========================================
    // Phase 2: Configuration & State Setup
    // ========================================

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to load configuration: {}", e),
        )
    })?;

    let socket_addr = config.socket_addr().map_err(|e| {
        error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", socket_addr);
    info!("Printer address: tcp://{}", config.printer.address());

    let app_state = AppState::new(config).map_err(|e| {
        error!("Application initialization error: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize application: {}", e),
        )
    })?;

    // ========================================
    // Phase 3: HTTP Server Setup
    // ========================================

    let app_state_for_server = app_state.clone();

    let server = HttpServer::new(move || {
        let state = app_state_for_server.clone();
        App::new()
            // Middleware
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            // Application state
            .app_data(state.template)
            .app_data(state.uploads)
            .app_data(state.transmitter)
            // Uploaded tables
            .service(routes::upload_table)
            // Rendering
            .service(routes::create_report)
            .service(routes::row_report)
            // Printing
            .service(routes::print_row)
            .service(routes::printer_status)
    })
    .bind(socket_addr)?
    .shutdown_timeout(5)
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(async move { server.await });

    info!("Lab receipt server started on {}", socket_addr);

    // ========================================
    // Phase 4: Run Until Shutdown
    // ========================================

    shutdown_signal().await;

    // ========================================
    // Phase 5: Graceful Shutdown
    // ========================================

    info!("Initiating graceful shutdown...");

    // Stop accepting new connections and wait for running print jobs
    server_handle.stop(true).await;

    server_task.await.map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Server task error: {}", e),
        )
    })??;

    info!("Graceful shutdown complete");
    Ok(())
}
