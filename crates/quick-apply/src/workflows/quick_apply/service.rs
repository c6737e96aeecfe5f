use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::answers::AnswerStore;
use super::domain::{ApplicationStatus, JobId};
use super::driver::FormDriver;
use super::ledger::{JobSource, LedgerError, StatusTracker};
use super::machine::ApplicationStateMachine;

/// Outcome of one job inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: ApplicationStatus,
}

/// Results of draining the job queue once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    /// Per-status totals in taxonomy order, omitting statuses that never occurred.
    pub fn totals(&self) -> Vec<(ApplicationStatus, usize)> {
        ApplicationStatus::TERMINAL
            .into_iter()
            .map(|status| (status, self.count(status)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuickApplyServiceError {
    #[error("job source failed after {processed} job(s): {source}")]
    Source {
        processed: usize,
        #[source]
        source: LedgerError,
    },
}

/// Applies to queued jobs one after another through a single browser session.
pub struct QuickApplyService<Q, S, T> {
    source: Arc<Q>,
    machine: ApplicationStateMachine<S, T>,
}

impl<Q, S, T> QuickApplyService<Q, S, T>
where
    Q: JobSource,
    S: AnswerStore,
    T: StatusTracker,
{
    pub fn new(source: Arc<Q>, machine: ApplicationStateMachine<S, T>) -> Self {
        Self { source, machine }
    }

    /// Drains the queue, stopping after `limit` jobs when one is given.
    pub fn run<D>(
        &self,
        driver: &mut D,
        limit: Option<usize>,
    ) -> Result<RunSummary, QuickApplyServiceError>
    where
        D: FormDriver + ?Sized,
    {
        let mut summary = RunSummary::default();

        while limit.map_or(true, |limit| summary.processed() < limit) {
            let posting = self
                .source
                .next_pending()
                .map_err(|source| QuickApplyServiceError::Source {
                    processed: summary.processed(),
                    source,
                })?;
            let Some(posting) = posting else {
                break;
            };

            let status = self.machine.run(driver, &posting);
            summary.outcomes.push(JobOutcome {
                job_id: posting.job_id,
                status,
            });
        }

        info!(processed = summary.processed(), "job queue drained");
        Ok(summary)
    }
}
