pub mod actions;
pub mod ai;
pub mod runtime;

pub use runtime::AiRuntime;

use ai::config::LoggingConfig;

/// Return the platform-standard data directory for FreightDesk.
///
/// - macOS: `~/Library/Application Support/com.freightdesk.app/`
/// - Windows: `{FOLDERID_RoamingAppData}\com.freightdesk.app\`
/// - Linux: `$XDG_DATA_HOME/com.freightdesk.app/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.freightdesk/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("com.freightdesk.app");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".freightdesk")
}

/// Directory the log file lives in: `logging.dir`, else [`data_dir`].
pub fn log_dir(config: &LoggingConfig) -> std::path::PathBuf {
    config
        .dir
        .as_ref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(data_dir)
}

/// Initialize the tracing subscriber, writing structured logs to [`log_dir`].
///
/// On each call:
/// 1. Rotates existing logs (freightdesk.log → .1 → … → `.{keep}`).
/// 2. Opens a fresh freightdesk.log with a line-flushing writer.
/// 3. Logs a startup banner with the log directory path.
///
/// `RUST_LOG` overrides `logging.filter`.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let dir = log_dir(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let log_path = dir.join("freightdesk.log");
    rotate_log_file(&log_path, config.keep);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .with_context(|| format!("invalid log filter '{}'", config.filter))?;

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing already initialized: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== FreightDesk starting ==="
    );
    Ok(())
}

/// Rotate log files: `freightdesk.log` → `.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so each
/// log line reaches disk even if the process dies.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
