use std::sync::Arc;

use clap::{Args, Subcommand};
use quick_apply::config::{AppConfig, BrowserConfig};
use quick_apply::error::AppError;
use quick_apply::telemetry;
use quick_apply::workflows::quick_apply::{
    AnswerReview, AnswerStatus, AnswerView, ApplicationStateMachine, JobId, JobPosting,
    JsonAnswerStore, JsonJobLedger, LedgerEntry, QuickApplyService, RunSummary, SiteProfile,
    WebDriverSession,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::infra::{answer_from_values, answer_review, job_ledger};

#[derive(Args, Debug, Default)]
pub(crate) struct ApplyArgs {
    /// Stop after this many jobs
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum AnswersCommand {
    /// Print stored answers as JSON
    List(ListAnswersArgs),
    /// Approve an answer so it is filled into future forms
    Approve(ApproveArgs),
    /// Move an approved answer back to pending review
    Revoke(RevokeArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ListAnswersArgs {
    /// Only show answers awaiting review
    #[arg(long)]
    pub(crate) pending: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ApproveArgs {
    #[arg(long)]
    pub(crate) question: String,
    /// Answer value; repeat for multi-select questions, omit to approve the recorded answer
    #[arg(long)]
    pub(crate) value: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RevokeArgs {
    #[arg(long)]
    pub(crate) question: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum JobsCommand {
    /// Queue a job posting
    Add(AddJobArgs),
    /// Print the job ledger as JSON
    List,
    /// Return retryable jobs to the queue
    Requeue(RequeueArgs),
}

#[derive(Args, Debug)]
pub(crate) struct AddJobArgs {
    #[arg(long)]
    pub(crate) id: String,
    /// Apply URL; defaults to the configured job URL template
    #[arg(long)]
    pub(crate) url: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RequeueArgs {
    /// Also retry jobs that ended in FAILED
    #[arg(long)]
    pub(crate) include_failed: bool,
}

pub(crate) async fn run_apply(args: ApplyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let summary = tokio::task::spawn_blocking(move || apply_jobs(&config, args.limit))
        .await
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))??;

    for outcome in &summary.outcomes {
        println!("{}\t{}", outcome.job_id, outcome.status);
    }
    for (status, count) in summary.totals() {
        println!("{status}: {count}");
    }
    Ok(())
}

/// Drains the job ledger through one WebDriver session.
fn apply_jobs(config: &AppConfig, limit: Option<usize>) -> Result<RunSummary, AppError> {
    let profile = SiteProfile::default();
    let answers = Arc::new(JsonAnswerStore::new(&config.storage.answers_path));
    let ledger = job_ledger(config);

    let mut session = WebDriverSession::connect(&config.browser, &config.engine, profile.clone())?;
    info!(webdriver = %config.browser.webdriver_url, "browser session attached");

    let machine = ApplicationStateMachine::new(answers, ledger.clone(), profile, config.engine);
    let service = QuickApplyService::new(ledger, machine);
    let summary = service.run(&mut session, limit);

    if let Err(err) = session.close() {
        warn!(error = %err, "unable to close browser session");
    }
    Ok(summary?)
}

pub(crate) fn run_answers(command: AnswersCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let review = answer_review(&config);

    match command {
        AnswersCommand::List(args) => {
            let status = args.pending.then_some(AnswerStatus::Pending);
            print_json(&review.list(status)?)
        }
        AnswersCommand::Approve(args) => {
            let view = approve(&review, args)?;
            print_json(&view)
        }
        AnswersCommand::Revoke(args) => print_json(&review.revoke(&args.question)?),
    }
}

fn approve(
    review: &AnswerReview<JsonAnswerStore>,
    args: ApproveArgs,
) -> Result<AnswerView, AppError> {
    let answer = answer_from_values(args.value);
    Ok(review.approve(&args.question, answer)?)
}

pub(crate) fn run_jobs(command: JobsCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let ledger = job_ledger(&config);

    match command {
        JobsCommand::Add(args) => {
            let added = add_job(&ledger, &config.browser, args)?;
            println!("{}", if added { "queued" } else { "already tracked" });
            Ok(())
        }
        JobsCommand::List => print_json(&list_jobs(&ledger)?),
        JobsCommand::Requeue(args) => {
            let count = ledger.requeue(args.include_failed)?;
            println!("requeued {count} job(s)");
            Ok(())
        }
    }
}

pub(crate) fn add_job(
    ledger: &JsonJobLedger,
    browser: &BrowserConfig,
    args: AddJobArgs,
) -> Result<bool, AppError> {
    let apply_url = args
        .url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| browser.job_url(&args.id));
    let posting = JobPosting {
        job_id: JobId(args.id),
        apply_url,
    };
    Ok(ledger.enqueue(posting)?)
}

fn list_jobs(ledger: &JsonJobLedger) -> Result<Vec<LedgerEntry>, AppError> {
    Ok(ledger.entries()?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))?;
    println!("{body}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn browser() -> BrowserConfig {
        BrowserConfig {
            webdriver_url: "http://localhost:9515".to_string(),
            debugger_address: None,
            job_url_template: "https://jobs.example.test/view/{job_id}/".to_string(),
        }
    }

    #[test]
    fn add_job_expands_url_template() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger = JsonJobLedger::new(dir.path().join("jobs.json"));

        let added = add_job(
            &ledger,
            &browser(),
            AddJobArgs {
                id: "3901".to_string(),
                url: None,
            },
        )
        .expect("queued");

        assert!(added);
        let entries = list_jobs(&ledger).expect("entries");
        assert_eq!(entries[0].apply_url, "https://jobs.example.test/view/3901/");
    }

    #[test]
    fn add_job_keeps_explicit_url_and_ignores_duplicates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger = JsonJobLedger::new(dir.path().join("jobs.json"));
        let args = || AddJobArgs {
            id: "7".to_string(),
            url: Some("https://careers.example.test/apply/7".to_string()),
        };

        assert!(add_job(&ledger, &browser(), args()).expect("queued"));
        assert!(!add_job(&ledger, &browser(), args()).expect("duplicate"));
        let entries = list_jobs(&ledger).expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].apply_url, "https://careers.example.test/apply/7");
    }
}
