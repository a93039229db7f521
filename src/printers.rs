use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::PrinterConfig;
use crate::errors::PrinterError;
use crate::escpos::{load_logo, CommandBatch};

/// Lifecycle of a single print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintState {
    Idle,
    Probing,
    Connected,
    Transmitting,
    Cutting,
    Done,
    Unreachable,
    Aborted,
}

impl PrintState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PrintState::Done | PrintState::Unreachable | PrintState::Aborted
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PrinterStatus {
    pub is_online: bool,
    pub address: String,
    pub printer_type: &'static str,
}

// Printer trait
#[async_trait]
pub trait Printer: Send + Sync {
    /// Reachability probe. Sends nothing.
    async fn is_connected(&self) -> bool;
    /// Delivers one complete command batch.
    async fn execute(&self, batch: &[u8]) -> Result<(), PrinterError>;
    fn address(&self) -> String;
    fn type_name(&self) -> &'static str;

    async fn get_status(&self) -> PrinterStatus {
        PrinterStatus {
            is_online: self.is_connected().await,
            address: self.address(),
            printer_type: self.type_name(),
        }
    }
}

/// Raw TCP receipt printer, usually on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    probe_timeout: Duration,
    write_timeout: Duration,
}

impl NetworkPrinter {
    pub fn new(host: &str, port: u16) -> Result<Self, PrinterError> {
        if host.trim().is_empty() {
            return Err(PrinterError::InvalidConfig(
                "printer host must not be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(PrinterError::InvalidConfig(format!(
                "invalid printer port for {}",
                host
            )));
        }
        Ok(Self {
            host: host.trim().to_string(),
            port,
            probe_timeout: Duration::from_secs(3),
            write_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeouts(mut self, probe: Duration, write: Duration) -> Self {
        self.probe_timeout = probe;
        self.write_timeout = write;
        self
    }

    async fn send(&self, batch: &[u8]) -> std::io::Result<()> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.write_all(batch).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl Printer for NetworkPrinter {
    #[instrument(skip(self), fields(addr = %self.address()))]
    async fn is_connected(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.probe_timeout, connect).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer probe timed out");
                false
            }
        }
    }

    #[instrument(skip(self, batch), fields(addr = %self.address(), data_len = batch.len()))]
    async fn execute(&self, batch: &[u8]) -> Result<(), PrinterError> {
        match tokio::time::timeout(self.write_timeout, self.send(batch)).await {
            Ok(Ok(())) => {
                info!("Sent {} bytes", batch.len());
                Ok(())
            }
            Ok(Err(e)) => Err(PrinterError::transmission(self.address(), e)),
            Err(_) => Err(PrinterError::transmission(
                self.address(),
                format!("write timed out after {:?}", self.write_timeout),
            )),
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn type_name(&self) -> &'static str {
        "ESC/POS network printer"
    }
}

// Mock printer implementation for testing or when no real printer is available
pub struct MockPrinter {
    online: AtomicBool,
    executed: Mutex<Vec<Vec<u8>>>,
}

impl Default for MockPrinter {
    fn default() -> Self {
        MockPrinter {
            online: AtomicBool::new(true),
            executed: Mutex::new(Vec::new()),
        }
    }
}

impl MockPrinter {
    pub fn offline() -> Self {
        let printer = MockPrinter::default();
        printer.set_online(false);
        printer
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Every batch executed so far, oldest first.
    pub async fn executed(&self) -> Vec<Vec<u8>> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl Printer for MockPrinter {
    async fn is_connected(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    async fn execute(&self, batch: &[u8]) -> Result<(), PrinterError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(PrinterError::transmission(self.address(), "mock printer is offline"));
        }
        self.executed.lock().await.push(batch.to_vec());
        Ok(())
    }

    fn address(&self) -> String {
        "mock:9100".to_string()
    }

    fn type_name(&self) -> &'static str {
        "Mock Printer"
    }
}

// Factory function to create appropriate printer instance
pub fn new_printer(config: &PrinterConfig) -> Result<Arc<dyn Printer>, PrinterError> {
    if config.use_mock {
        warn!("USE_MOCK_PRINTER is set, print jobs will not reach a device");
        return Ok(Arc::new(MockPrinter::default()));
    }

    let printer = NetworkPrinter::new(&config.host, config.port)?
        .with_timeouts(config.probe_timeout(), config.write_timeout());
    info!("Using network printer at tcp://{}", printer.address());
    Ok(Arc::new(printer))
}

/// One job moving through [`PrintState`]; every transition is logged.
struct PrintJob {
    id: Uuid,
    address: String,
    state: PrintState,
}

impl PrintJob {
    fn new(address: String) -> Self {
        PrintJob {
            id: Uuid::new_v4(),
            address,
            state: PrintState::Idle,
        }
    }

    fn advance(&mut self, next: PrintState) {
        info!(
            job = %self.id,
            addr = %self.address,
            from = ?self.state,
            to = ?next,
            "print job state"
        );
        self.state = next;
    }
}

/// Delivers rendered reports to one printer, one job at a time.
pub struct PrintTransmitter {
    printer: Arc<dyn Printer>,
    logo_path: Option<PathBuf>,
    spool_dir: PathBuf,
    job_lock: Mutex<()>,
}

impl PrintTransmitter {
    pub fn new(printer: Arc<dyn Printer>, spool_dir: impl Into<PathBuf>) -> Self {
        PrintTransmitter {
            printer,
            logo_path: None,
            spool_dir: spool_dir.into(),
            job_lock: Mutex::new(()),
        }
    }

    pub fn with_logo(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo_path = Some(path.into());
        self
    }

    pub fn from_config(config: &PrinterConfig) -> Result<Self, PrinterError> {
        let printer = new_printer(config)?;
        Ok(PrintTransmitter::new(printer, config.spool_dir.clone()).with_logo(config.logo_path.clone()))
    }

    pub fn printer(&self) -> &Arc<dyn Printer> {
        &self.printer
    }

    pub async fn status(&self) -> PrinterStatus {
        self.printer.get_status().await
    }

    /// Prints a rendered report. Returns [`PrintState::Done`] or the error
    /// that ended the job.
    #[instrument(skip(self, png), fields(png_len = png.len()))]
    pub async fn print(&self, png: &[u8], sample_name: &str) -> Result<PrintState, PrinterError> {
        let _device = self.job_lock.lock().await;
        let mut job = PrintJob::new(self.printer.address());

        job.advance(PrintState::Probing);
        if !self.printer.is_connected().await {
            job.advance(PrintState::Unreachable);
            return Err(PrinterError::Unreachable {
                address: job.address,
            });
        }
        job.advance(PrintState::Connected);

        match self.transmit(&mut job, png).await {
            Ok(()) => {
                job.advance(PrintState::Done);
                info!(job = %job.id, "Printed report for {}", sample_name);
                Ok(PrintState::Done)
            }
            Err(e) => {
                job.advance(PrintState::Aborted);
                error!(job = %job.id, "Print job aborted: {}", e);
                Err(e)
            }
        }
    }

    async fn transmit(&self, job: &mut PrintJob, png: &[u8]) -> Result<(), PrinterError> {
        // Removed when dropped, on success and on every error path.
        let spool = self.spool(png, &job.address)?;
        let report = image::open(spool.path())
            .map_err(|e| PrinterError::transmission(&job.address, format!("cannot load report image: {}", e)))?;

        job.advance(PrintState::Transmitting);
        let mut batch = CommandBatch::new();
        batch.init().density().center();
        if let Some(logo) = self.logo_path.as_deref().and_then(load_logo) {
            batch.image(&logo).line_feed();
        }
        batch.image(&report).line_feed();

        job.advance(PrintState::Cutting);
        batch.cut();

        self.printer.execute(batch.as_bytes()).await
    }

    fn spool(&self, png: &[u8], address: &str) -> Result<NamedTempFile, PrinterError> {
        write_spool_file(&self.spool_dir, png)
            .map_err(|e| PrinterError::transmission(address, format!("spool file: {}", e)))
    }
}

fn write_spool_file(dir: &Path, png: &[u8]) -> std::io::Result<NamedTempFile> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("print_")
        .suffix(".png")
        .tempfile_in(dir)?;
    file.write_all(png)?;
    file.flush()?;
    Ok(file)
}
