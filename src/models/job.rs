use crate::error::{AppError, Result};
use crate::models::WorkIndexDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Kind of change an indexing job applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    Create,
    Update,
    Delete,
}

impl JobType {
    /// Whether the job writes a document (as opposed to removing one)
    pub fn is_write(&self) -> bool {
        !matches!(self, JobType::Delete)
    }
}

/// Lifecycle state of an indexing job
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Transitions allowed by the job state machine, ignoring retry budget
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Failed, JobStatus::Pending)
        )
    }
}

/// A unit of indexing work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingJob {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    #[serde(rename = "type")]
    pub job_type: JobType,

    pub work_id: String,

    /// Document payload, required for create and update jobs
    #[serde(default)]
    pub document: Option<WorkIndexDocument>,

    /// 1 (lowest) to 5 (highest)
    #[serde(default = "default_priority")]
    pub priority: u8,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default)]
    pub last_error: Option<String>,
}

fn default_priority() -> u8 {
    3
}

fn default_max_retries() -> u32 {
    3
}

impl IndexingJob {
    pub fn new(job_type: JobType, work_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            work_id: work_id.into(),
            document: None,
            priority: default_priority(),
            retries: 0,
            max_retries: default_max_retries(),
            timestamp: Utc::now(),
            status: JobStatus::Pending,
            last_error: None,
        }
    }

    /// Create job carrying the given document
    pub fn create(document: WorkIndexDocument) -> Self {
        let mut job = Self::new(JobType::Create, document.work_id.clone());
        job.document = Some(document);
        job
    }

    /// Update job carrying the given document
    pub fn update(document: WorkIndexDocument) -> Self {
        let mut job = Self::new(JobType::Update, document.work_id.clone());
        job.document = Some(document);
        job
    }

    pub fn delete(work_id: impl Into<String>) -> Self {
        Self::new(JobType::Delete, work_id)
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Move the job to `next`, rejecting transitions the state machine forbids
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        if self.status == JobStatus::Failed && next == JobStatus::Pending {
            if self.retries >= self.max_retries {
                return Err(AppError::InvalidStateTransition(format!(
                    "job {} exhausted {} retries",
                    self.id, self.max_retries
                )));
            }
            self.retries += 1;
        }
        self.status = next;
        Ok(())
    }

    /// Record a failure and move to `failed`
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.last_error = Some(error.into());
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.retries < self.max_retries
    }

    pub fn is_terminal(&self) -> bool {
        match self.status {
            JobStatus::Completed => true,
            JobStatus::Failed => !self.can_retry(),
            _ => false,
        }
    }
}

/// Visibility guarantee requested from the index after a write
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshPolicy {
    /// Searchable as soon as the write returns
    Immediate,
    /// Write returns once the next refresh has made it searchable
    WaitFor,
    /// Searchable after the index's own refresh interval
    #[default]
    Deferred,
}

impl RefreshPolicy {
    /// Value of the `refresh` query parameter
    pub fn as_param(&self) -> &'static str {
        match self {
            RefreshPolicy::Immediate => "true",
            RefreshPolicy::WaitFor => "wait_for",
            RefreshPolicy::Deferred => "false",
        }
    }
}

/// Options for a bulk indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkIndexingOptions {
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub flush_interval_secs: u64,
    pub refresh_policy: RefreshPolicy,
    pub enable_retries: bool,
    pub retry_delay_ms: u64,
}

impl Default for BulkIndexingOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrency: 5,
            flush_interval_secs: 30,
            refresh_policy: RefreshPolicy::Deferred,
            enable_retries: true,
            retry_delay_ms: 1000,
        }
    }
}

impl BulkIndexingOptions {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Final outcome of one job in a bulk run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub work_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub attempts: u32,
    pub version: Option<u64>,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Aggregate outcome of a bulk indexing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkIndexingResult {
    pub total_jobs: usize,
    pub successful: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// Jobs per second
    pub throughput: f64,
    pub cancelled: bool,
    pub outcomes: Vec<JobOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_happy_path() {
        let mut job = IndexingJob::delete("w1");
        assert_eq!(job.status, JobStatus::Pending);
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.is_terminal());
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut job = IndexingJob::delete("w1");
        job.transition(JobStatus::Processing).unwrap();
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.transition(JobStatus::Pending).is_err());
        assert!(job.transition(JobStatus::Processing).is_err());
    }

    #[test]
    fn test_failed_requeues_while_retries_remain() {
        let mut job = IndexingJob::delete("w1").with_max_retries(1);
        job.transition(JobStatus::Processing).unwrap();
        job.fail("boom").unwrap();
        assert!(job.can_retry());
        assert_eq!(job.last_error.as_deref(), Some("boom"));

        job.transition(JobStatus::Pending).unwrap();
        assert_eq!(job.retries, 1);

        job.transition(JobStatus::Processing).unwrap();
        job.fail("boom again").unwrap();
        assert!(!job.can_retry());
        assert!(job.is_terminal());

        let err = job.transition(JobStatus::Pending).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_STATE_TRANSITION");
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        let mut job = IndexingJob::delete("w1");
        assert!(job.transition(JobStatus::Completed).is_err());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_priority_is_clamped() {
        assert_eq!(IndexingJob::delete("w").with_priority(9).priority, 5);
        assert_eq!(IndexingJob::delete("w").with_priority(0).priority, 1);
    }

    #[test]
    fn test_job_deserializes_with_type_field() {
        let job: IndexingJob =
            serde_json::from_str(r#"{"type": "delete", "work_id": "w9"}"#).unwrap();
        assert_eq!(job.job_type, JobType::Delete);
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_bulk_option_defaults() {
        let options = BulkIndexingOptions::default();
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.max_concurrency, 5);
        assert_eq!(options.flush_interval(), Duration::from_secs(30));
        assert_eq!(options.refresh_policy, RefreshPolicy::Deferred);
        assert_eq!(RefreshPolicy::Immediate.as_param(), "true");
    }
}
