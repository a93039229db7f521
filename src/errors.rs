use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Printer error: {0}")]
    Printer(#[from] PrinterError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Web error: {0}")]
    Web(String),
}

/// Raster or encoding invariant violations. Fatal to the render call.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Failed to encode image: {0}")]
    ImageEncode(String),

    #[error("Font loading error: {0}")]
    FontError(String),
}

#[derive(Debug, Error)]
pub enum PrinterError {
    /// The reachability probe failed before anything was sent.
    #[error("Printer at tcp://{address} is not reachable. Check the printer connection.")]
    Unreachable { address: String },

    /// I/O failed after the printer was found reachable.
    #[error("Transmission to tcp://{address} failed: {cause}")]
    TransmissionFailed { address: String, cause: String },

    #[error("Invalid printer configuration: {0}")]
    InvalidConfig(String),
}

impl PrinterError {
    pub fn transmission(address: impl Into<String>, cause: impl ToString) -> Self {
        PrinterError::TransmissionFailed {
            address: address.into(),
            cause: cause.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload not found: {key}")]
    NotFound { key: String },

    #[error("Row {row} not found in upload {key}")]
    RowNotFound { key: String, row: usize },

    #[error("Upload contains no columns")]
    NoColumns,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,

    #[error("THERMAL_PRINTER_IP must not be empty")]
    InvalidPrinterHost,

    #[error("Invalid printer port: {value}")]
    InvalidPrinterPort { value: String },

    #[error("Invalid timeout for {name}: {value}")]
    InvalidTimeout { name: &'static str, value: String },

    #[error("Invalid value for {name}: {value} (expected true or false)")]
    InvalidFlag { name: &'static str, value: String },

    #[error("Invalid upload cache capacity: {value}")]
    InvalidCapacity { value: String },
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Initialization(_) => 500,
            AppError::Render(_) => 500,
            AppError::Printer(PrinterError::Unreachable { .. }) => 503,
            AppError::Printer(PrinterError::TransmissionFailed { .. }) => 502,
            AppError::Printer(PrinterError::InvalidConfig(_)) => 500,
            AppError::Upload(UploadError::NoColumns) => 400,
            AppError::Upload(_) => 404,
            AppError::Config(_) => 500,
            AppError::Web(_) => 500,
        }
    }

    pub fn error_response(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "error_type": self.error_type()
        })
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Initialization(_) => "initialization_error",
            AppError::Render(_) => "render_error",
            AppError::Printer(PrinterError::Unreachable { .. }) => "device_unreachable",
            AppError::Printer(PrinterError::TransmissionFailed { .. }) => "transmission_failure",
            AppError::Printer(_) => "printer_error",
            AppError::Upload(_) => "upload_error",
            AppError::Config(_) => "config_error",
            AppError::Web(_) => "web_error",
        }
    }
}
