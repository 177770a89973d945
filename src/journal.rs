//! Date-partitioned CSV journal of successful readings
//!
//! One file per local calendar day, named `rectifier_YYYY-MM-DD.csv`, with a
//! header row written only when the file is first created. Every write
//! flushes immediately so downloads served from the same directory always
//! see current content.

use chrono::{Local, NaiveDate};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::types::Reading;
use crate::{RectSrvError, Result};

const CSV_HEADER: [&str; 5] = [
    "timestamp",
    "actual_voltage",
    "actual_current",
    "power",
    "polarity",
];

#[derive(Debug)]
struct JournalInner {
    root_dir: PathBuf,
    /// Calendar date the open file is bound to; `None` when no file is open
    current_date: Option<NaiveDate>,
    writer: Option<csv::Writer<File>>,
}

/// Append-only CSV journal.
///
/// One mutex spans rotation check, row write and flush, so concurrent callers
/// never interleave a write with a rotation.
#[derive(Debug)]
pub struct CsvJournal {
    inner: Mutex<JournalInner>,
}

impl CsvJournal {
    /// Create a journal rooted at `root_dir`, creating the directory if needed.
    /// File creation is deferred to the first write.
    pub fn new(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        std::fs::create_dir_all(&root_dir)?;
        Ok(Self {
            inner: Mutex::new(JournalInner {
                root_dir,
                current_date: None,
                writer: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current journal root directory
    pub fn root_dir(&self) -> PathBuf {
        self.lock().root_dir.clone()
    }

    /// Re-point the journal at a new root directory.
    ///
    /// Closes any open file and defers opening the new one to the next write.
    pub fn set_root_dir(&self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(RectSrvError::data("journal root directory cannot be blank"));
        }

        let mut inner = self.lock();
        inner.root_dir = PathBuf::from(path);
        std::fs::create_dir_all(&inner.root_dir)?;

        // Forced rotation: drop the open file, next write reopens under the
        // new root.
        if let Some(mut writer) = inner.writer.take() {
            let _ = writer.flush();
        }
        inner.current_date = None;

        info!("journal root directory set to {}", inner.root_dir.display());
        Ok(())
    }

    /// Append one reading, rotating to today's file first if needed.
    ///
    /// Incomplete readings are silently discarded; callers are expected to
    /// filter error-tagged readings already, this re-validates.
    pub fn write(&self, reading: &Reading) -> Result<()> {
        self.write_dated(reading, Local::now().date_naive())
    }

    fn write_dated(&self, reading: &Reading, date: NaiveDate) -> Result<()> {
        let (Some(voltage), Some(current), Some(power), Some(polarity)) = (
            reading.actual_voltage,
            reading.actual_current,
            reading.power,
            reading.polarity,
        ) else {
            debug!("discarding incomplete reading");
            return Ok(());
        };

        let mut inner = self.lock();
        Self::rotate_if_needed(&mut inner, date)?;

        let writer = inner
            .writer
            .as_mut()
            .ok_or_else(|| RectSrvError::internal("journal writer missing after rotation"))?;

        writer.write_record([
            reading.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            voltage.to_string(),
            current.to_string(),
            power.to_string(),
            polarity.to_string(),
        ])?;
        // Flush per row so external downloads see up-to-date content
        writer.flush()?;
        Ok(())
    }

    fn rotate_if_needed(inner: &mut JournalInner, date: NaiveDate) -> Result<()> {
        if inner.current_date == Some(date) && inner.writer.is_some() {
            return Ok(());
        }

        if let Some(mut writer) = inner.writer.take() {
            let _ = writer.flush();
        }

        let path = Self::file_path(&inner.root_dir, date);
        let existed = path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::Writer::from_writer(file);

        if !existed {
            writer.write_record(CSV_HEADER)?;
            writer.flush()?;
        }

        info!("journal file opened: {}", path.display());
        inner.current_date = Some(date);
        inner.writer = Some(writer);
        Ok(())
    }

    fn file_path(root_dir: &Path, date: NaiveDate) -> PathBuf {
        root_dir.join(format!("rectifier_{}.csv", date.format("%Y-%m-%d")))
    }
}
