// Library module organization

pub mod config;
pub mod errors;

// Report rendering
pub mod encoder;
pub mod fields;
pub mod layout;
pub mod raster;
pub mod templates;
pub mod typeface;

// Printer functionality
pub mod escpos;
pub mod printers;

// Uploaded tables
pub mod table;
pub mod uploads;

pub mod routes;

// Re-export commonly used types for convenience
pub use errors::{AppError, PrinterError, RenderError};
pub use fields::{resolve_record, ReportRecord};
pub use printers::{
    new_printer, MockPrinter, NetworkPrinter, PrintState, PrintTransmitter, Printer,
    PrinterStatus,
};
pub use templates::{render_report, ReportTemplate};
