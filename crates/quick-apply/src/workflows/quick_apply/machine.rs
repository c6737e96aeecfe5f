//! Drives one job application from the job page to a terminal status.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::answers::{AnswerStore, AnswerStoreError};
use super::domain::{ApplicationAttempt, ApplicationStatus, JobPosting};
use super::driver::{ActionControl, DriverError, FormDriver};
use super::filler::FieldFiller;
use super::ledger::StatusTracker;
use super::profile::SiteProfile;
use super::progress::{Progress, ProgressTracker};
use crate::config::EngineConfig;

/// Failures raised inside the form loop. The state machine maps every one of them to `FAILED`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Store(#[from] AnswerStoreError),
}

/// Role of a footer control, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    Submit,
    Advance,
    Review,
}

/// Picks the control to press on the current page: submit, then advance, then review.
pub fn locate_control<'c>(
    controls: &'c [ActionControl],
    profile: &SiteProfile,
) -> Option<(ControlRole, &'c ActionControl)> {
    let roles = [
        (ControlRole::Submit, &profile.submit_labels),
        (ControlRole::Advance, &profile.advance_labels),
        (ControlRole::Review, &profile.review_labels),
    ];

    roles.into_iter().find_map(|(role, labels)| {
        controls
            .iter()
            .find(|control| {
                let label = control.label.trim();
                labels
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(label))
            })
            .map(|control| (role, control))
    })
}

pub struct ApplicationStateMachine<S, T> {
    store: Arc<S>,
    tracker: Arc<T>,
    profile: SiteProfile,
    engine: EngineConfig,
    today: Option<NaiveDate>,
}

impl<S, T> ApplicationStateMachine<S, T>
where
    S: AnswerStore,
    T: StatusTracker,
{
    pub fn new(store: Arc<S>, tracker: Arc<T>, profile: SiteProfile, engine: EngineConfig) -> Self {
        Self {
            store,
            tracker,
            profile,
            engine,
            today: None,
        }
    }

    /// Pins the date written into empty date fields.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Runs one application to completion. Never fails: errors become `FAILED`, and the
    /// terminal status is reported to the tracker exactly once.
    pub fn run<D>(&self, driver: &mut D, job: &JobPosting) -> ApplicationStatus
    where
        D: FormDriver + ?Sized,
    {
        let mut attempt = ApplicationAttempt::start(job.job_id.clone());
        debug!(job_id = %job.job_id, url = %job.apply_url, "application started");

        let status = match self.drive(driver, job) {
            Ok(status) => status,
            Err(err) => {
                warn!(job_id = %job.job_id, error = %err, "application aborted");
                ApplicationStatus::Failed
            }
        };

        if attempt.finish(status) {
            self.report(&attempt);
        }
        attempt.status()
    }

    fn report(&self, attempt: &ApplicationAttempt) {
        let job_id = attempt.job_id();
        let status = attempt.status();
        info!(job_id = %job_id, status = %status, "application finished");
        if let Err(err) = self.tracker.record(job_id, status) {
            warn!(job_id = %job_id, status = %status, error = %err, "unable to record status");
        }
    }

    fn drive<D>(&self, driver: &mut D, job: &JobPosting) -> Result<ApplicationStatus, EngineError>
    where
        D: FormDriver + ?Sized,
    {
        let timeout = self.engine.element_timeout;
        driver.navigate(&job.apply_url)?;

        if let Some(header) = driver.job_header(timeout)? {
            let text = header.text_content();
            if SiteProfile::mentions_any(&text, &self.profile.already_applied_markers) {
                return Ok(ApplicationStatus::Already);
            }
            if SiteProfile::mentions_any(&text, &self.profile.closed_markers) {
                return Ok(ApplicationStatus::Notavail);
            }
        }

        if !driver.start_apply(timeout)? {
            warn!(job_id = %job.job_id, "quick apply entry not offered");
            return Ok(ApplicationStatus::Failed);
        }

        let mut filler = FieldFiller::new(&self.profile);
        if let Some(today) = self.today {
            filler = filler.with_today(today);
        }
        let mut progress = ProgressTracker::new(self.engine.stall_threshold);

        loop {
            let Some(before) = driver.snapshot(timeout)? else {
                warn!(job_id = %job.job_id, "application form not open");
                return Ok(ApplicationStatus::Failed);
            };
            progress.baseline(before);

            // The store is re-read on every pass so reviewer edits apply mid-run.
            filler.fill_pass(driver, self.store.as_ref())?;

            let controls = driver.action_controls()?;
            let Some((role, control)) = locate_control(&controls, &self.profile) else {
                warn!(job_id = %job.job_id, "no submit, advance or review control");
                return Ok(ApplicationStatus::Failed);
            };
            debug!(job_id = %job.job_id, control = %control.label, ?role, "pressing control");

            if role == ControlRole::Submit {
                if driver.follow_company()? == Some(true) {
                    driver.set_follow_company(false)?;
                }
                driver.invoke(control)?;
                return Ok(if driver.await_confirmation(self.engine.confirmation_timeout)? {
                    ApplicationStatus::Completed
                } else {
                    warn!(job_id = %job.job_id, "submission not confirmed");
                    ApplicationStatus::Resubmit
                });
            }

            driver.invoke(control)?;
            let Some(after) = driver.snapshot(timeout)? else {
                warn!(job_id = %job.job_id, "form closed after advancing");
                return Ok(ApplicationStatus::Failed);
            };
            if progress.observe(after) == Progress::Stalled {
                warn!(
                    job_id = %job.job_id,
                    stalls = progress.stall_count(),
                    "form did not advance"
                );
                return Ok(ApplicationStatus::Resubmit);
            }
        }
    }
}
