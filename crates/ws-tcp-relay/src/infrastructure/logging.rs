//! Logging setup: stderr always, plus an optional file that rolls daily.
//!
//! Log files are named `<year>-<month>-<day> <name>.log` in local time, with
//! no zero padding (`2026-3-7 ws-tcp-relay.log`).  The first line written on a
//! new day opens that day's file; every later line on that day reuses it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use chrono::{Datelike, Local, NaiveDate};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log lines go besides stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Directory for daily log files.  `None` logs to stderr only.
    pub dir: Option<PathBuf>,
    /// Base name of each log file.
    pub name: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            name: "ws-tcp-relay".to_string(),
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// The log level comes from `RUST_LOG` and defaults to `info`.
///
/// # Errors
///
/// Fails if the log directory cannot be created, the first log file cannot
/// be opened, or a subscriber is already installed.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &settings.dir {
        Some(dir) => {
            let writer = DailyFileWriter::new(dir, &settings.name)
                .with_context(|| format!("failed to open log file in {}", dir.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("failed to install the tracing subscriber")
}

// ── Daily file writer ─────────────────────────────────────────────────────────

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

struct ActiveFile {
    date: NaiveDate,
    file: Arc<File>,
}

/// A [`MakeWriter`] that appends to one file per local calendar day.
pub struct DailyFileWriter {
    dir: PathBuf,
    name: String,
    today: Clock,
    active: RwLock<ActiveFile>,
}

impl DailyFileWriter {
    /// Creates `dir` if needed and opens today's file.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> io::Result<Self> {
        Self::with_clock(dir, name, || Local::now().date_naive())
    }

    /// Like [`new`](Self::new), with the calendar date supplied by `today`.
    pub fn with_clock<F>(dir: impl Into<PathBuf>, name: impl Into<String>, today: F) -> io::Result<Self>
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        let dir = dir.into();
        let name = name.into();
        fs::create_dir_all(&dir)?;

        let date = today();
        let file = open_append(&log_file_path(&dir, &name, date))?;
        Ok(Self {
            dir,
            name,
            today: Box::new(today),
            active: RwLock::new(ActiveFile {
                date,
                file: Arc::new(file),
            }),
        })
    }

    /// The file that lines written on `date` go to.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        log_file_path(&self.dir, &self.name, date)
    }

    fn current(&self) -> Arc<File> {
        let today = (self.today)();
        {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            if active.date == today {
                return Arc::clone(&active.file);
            }
        }

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.date != today {
            // Only one attempt per day: on failure keep writing to the old file.
            active.date = today;
            match open_append(&self.path_for(today)) {
                Ok(file) => active.file = Arc::new(file),
                Err(e) => eprintln!(
                    "ws-tcp-relay: cannot open log file for {today}, keeping the previous one: {e}"
                ),
            }
        }
        Arc::clone(&active.file)
    }
}

impl<'a> MakeWriter<'a> for DailyFileWriter {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        LogFile(self.current())
    }
}

/// A handle on the day's log file.
pub struct LogFile(Arc<File>);

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

fn log_file_path(dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "{}-{}-{} {}.log",
        date.year(),
        date.month(),
        date.day(),
        name
    ))
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
