use crate::config::{parse_bool_flag, Config};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

/// Keeps the log file open for the lifetime of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<File>>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Appends to the shared log file; write errors are swallowed so logging
/// never takes the UI down.
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
        Ok(())
    }
}

fn make_writer(file: Option<Arc<Mutex<File>>>, to_stdout: bool) -> BoxMakeWriter {
    match file {
        Some(file) => BoxMakeWriter::new(move || LogFileWriter { file: file.clone() }),
        None if to_stdout => BoxMakeWriter::new(io::stdout),
        None => BoxMakeWriter::new(io::sink),
    }
}

/// The terminal belongs to the UI, so logs only reach stdout when
/// `GREENHOUSE_LOG_STDOUT` asks for it.
pub fn init_logging(config: &Config) -> Option<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(resolve_level(config.debug)));

    let file = match config.log_dir.as_deref().map(open_log_file) {
        Some(Ok(file)) => Some(Arc::new(Mutex::new(file))),
        Some(Err(err)) => {
            eprintln!("log_file_error: {err}");
            None
        }
        None => None,
    };
    let writer = make_writer(file.clone(), env_true("GREENHOUSE_LOG_STDOUT"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(LogGuard { file })
}

fn resolve_level(debug: bool) -> String {
    if debug {
        return "debug".to_string();
    }
    std::env::var("GREENHOUSE_LOG_LEVEL")
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn open_log_file(log_dir: &Path) -> io::Result<File> {
    std::fs::create_dir_all(log_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("greenhouse-dashboard.log"))
}

fn env_true(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}
