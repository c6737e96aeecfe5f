//! Job queue and outcome bookkeeping around the engine.
//!
//! The engine pulls postings from a [`JobSource`] and reports every terminal status to a
//! [`StatusTracker`]. [`JsonJobLedger`] plays both roles over a JSON document; retry cadence
//! is left to whoever calls [`JsonJobLedger::requeue`].

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ApplicationStatus, JobId, JobPosting};

/// Pull queue of postings awaiting an application run.
pub trait JobSource: Send + Sync {
    /// Next pending posting in queue order; each posting is handed out at most once.
    fn next_pending(&self) -> Result<Option<JobPosting>, LedgerError>;
}

/// Sink for terminal outcomes. Recording the same status twice must be harmless.
pub trait StatusTracker: Send + Sync {
    fn record(&self, job_id: &JobId, status: ApplicationStatus) -> Result<(), LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("job ledger {path} unreadable: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("job ledger {path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("job {0} is not in the ledger")]
    UnknownJob(JobId),
    #[error("{0} is not a terminal status")]
    NonTerminal(ApplicationStatus),
    #[error("job ledger unavailable: {0}")]
    Unavailable(String),
}

/// Queue state of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    Pending,
    Completed,
    Failed,
    Resubmit,
    Already,
    Notavail,
}

impl LedgerStatus {
    pub fn from_outcome(status: ApplicationStatus) -> Option<Self> {
        match status {
            ApplicationStatus::Started => None,
            ApplicationStatus::Completed => Some(Self::Completed),
            ApplicationStatus::Failed => Some(Self::Failed),
            ApplicationStatus::Resubmit => Some(Self::Resubmit),
            ApplicationStatus::Already => Some(Self::Already),
            ApplicationStatus::Notavail => Some(Self::Notavail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub job_id: JobId,
    pub apply_url: String,
    pub status: LedgerStatus,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn pending(posting: JobPosting) -> Self {
        Self {
            job_id: posting.job_id,
            apply_url: posting.apply_url,
            status: LedgerStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    fn posting(&self) -> JobPosting {
        JobPosting {
            job_id: self.job_id.clone(),
            apply_url: self.apply_url.clone(),
        }
    }
}

/// Queue operations shared by the file-backed and in-memory ledgers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct LedgerRows(Vec<LedgerEntry>);

impl LedgerRows {
    fn next_pending(&self, handed_out: &HashSet<JobId>) -> Option<JobPosting> {
        self.0
            .iter()
            .find(|entry| {
                entry.status == LedgerStatus::Pending && !handed_out.contains(&entry.job_id)
            })
            .map(LedgerEntry::posting)
    }

    /// Returns `true` when the row changed.
    fn record(&mut self, job_id: &JobId, status: ApplicationStatus) -> Result<bool, LedgerError> {
        let next = LedgerStatus::from_outcome(status).ok_or(LedgerError::NonTerminal(status))?;
        let entry = self
            .0
            .iter_mut()
            .find(|entry| &entry.job_id == job_id)
            .ok_or_else(|| LedgerError::UnknownJob(job_id.clone()))?;

        if entry.status == next {
            return Ok(false);
        }
        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(true)
    }

    fn enqueue(&mut self, posting: JobPosting) -> bool {
        if self.0.iter().any(|entry| entry.job_id == posting.job_id) {
            return false;
        }
        self.0.push(LedgerEntry::pending(posting));
        true
    }

    fn requeue(&mut self, include_failed: bool) -> usize {
        let now = Utc::now();
        let mut count = 0;
        for entry in &mut self.0 {
            let retry = match entry.status {
                LedgerStatus::Resubmit => true,
                LedgerStatus::Failed => include_failed,
                _ => false,
            };
            if retry {
                entry.status = LedgerStatus::Pending;
                entry.updated_at = now;
                count += 1;
            }
        }
        count
    }
}

/// Ledger persisted as a JSON array of rows, in queue order.
#[derive(Debug)]
pub struct JsonJobLedger {
    path: PathBuf,
    handed_out: Mutex<HashSet<JobId>>,
}

impl JsonJobLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handed_out: Mutex::new(HashSet::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.read()?.0)
    }

    /// Adds a pending posting. Returns `false` when the job is already tracked.
    pub fn enqueue(&self, posting: JobPosting) -> Result<bool, LedgerError> {
        let mut rows = self.read()?;
        let added = rows.enqueue(posting);
        if added {
            self.write(&rows)?;
        }
        Ok(added)
    }

    /// Puts retryable jobs back in the queue and returns how many were reset.
    pub fn requeue(&self, include_failed: bool) -> Result<usize, LedgerError> {
        let mut rows = self.read()?;
        let count = rows.requeue(include_failed);
        if count > 0 {
            self.write(&rows)?;
        }
        Ok(count)
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.display_path(),
            source,
        }
    }

    fn read(&self) -> Result<LedgerRows, LedgerError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "job ledger missing, starting empty");
                return Ok(LedgerRows::default());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        if raw.trim().is_empty() {
            return Ok(LedgerRows::default());
        }

        serde_json::from_str(&raw).map_err(|source| LedgerError::Malformed {
            path: self.display_path(),
            source,
        })
    }

    fn write(&self, rows: &LedgerRows) -> Result<(), LedgerError> {
        let body = serde_json::to_string_pretty(rows).map_err(|source| LedgerError::Malformed {
            path: self.display_path(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(|err| self.io_error(err))?;
        fs::rename(&tmp, &self.path).map_err(|err| self.io_error(err))
    }
}

impl JobSource for JsonJobLedger {
    fn next_pending(&self) -> Result<Option<JobPosting>, LedgerError> {
        let rows = self.read()?;
        let mut handed_out = self
            .handed_out
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger mutex poisoned".to_string()))?;

        let next = rows.next_pending(&handed_out);
        if let Some(posting) = &next {
            handed_out.insert(posting.job_id.clone());
        }
        Ok(next)
    }
}

impl StatusTracker for JsonJobLedger {
    fn record(&self, job_id: &JobId, status: ApplicationStatus) -> Result<(), LedgerError> {
        let mut rows = self.read()?;
        if rows.record(job_id, status)? {
            self.write(&rows)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryLedgerState {
    rows: LedgerRows,
    handed_out: HashSet<JobId>,
    reports: Vec<(JobId, ApplicationStatus)>,
}

/// Mutex-guarded ledger for tests and dry runs. Keeps every `record` call for inspection.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<MemoryLedgerState>>,
}

impl MemoryLedger {
    pub fn with_postings(postings: impl IntoIterator<Item = JobPosting>) -> Self {
        let ledger = Self::default();
        if let Ok(mut state) = ledger.state.lock() {
            for posting in postings {
                state.rows.enqueue(posting);
            }
        }
        ledger
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state
            .lock()
            .map(|state| state.rows.0.clone())
            .unwrap_or_default()
    }

    pub fn status_of(&self, job_id: &JobId) -> Option<LedgerStatus> {
        self.entries()
            .into_iter()
            .find(|entry| &entry.job_id == job_id)
            .map(|entry| entry.status)
    }

    /// Every status handed to `record`, including repeats.
    pub fn reports(&self) -> Vec<(JobId, ApplicationStatus)> {
        self.state
            .lock()
            .map(|state| state.reports.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryLedgerState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger mutex poisoned".to_string()))
    }
}

impl JobSource for MemoryLedger {
    fn next_pending(&self) -> Result<Option<JobPosting>, LedgerError> {
        let mut state = self.lock()?;
        let next = state.rows.next_pending(&state.handed_out);
        if let Some(posting) = &next {
            state.handed_out.insert(posting.job_id.clone());
        }
        Ok(next)
    }
}

impl StatusTracker for MemoryLedger {
    fn record(&self, job_id: &JobId, status: ApplicationStatus) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        state.reports.push((job_id.clone(), status));
        state.rows.record(job_id, status).map(|_| ())
    }
}
