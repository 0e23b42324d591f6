//! Asynchronous task handles and the poll-to-completion loop.
//!
//! Mutation calls answer with a task reference rather than the finished entity.
//! [`TaskTracker::submit`] dispatches a mutation and returns the [`Task`] handle at
//! once; [`TaskTracker::wait`] polls `GET /tasks/{uuid}` until the task is terminal.
//! Cancellation and the deadline are checked before every poll; an in-flight request
//! is never interrupted.

use chrono::{DateTime, Utc};
use prism_core::client::PollPolicy;
use prism_core::types::TaskStatus;
use prism_core::uuid::{EntityUuid, TaskUuid};
use prism_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::transport::{ApiRequest, Transport};

/// One asynchronous mutation in flight.
///
/// Only [`TaskTracker`] advances a task; callers see it read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    uuid: TaskUuid,
    status: TaskStatus,
    percentage_complete: u8,
    result: Option<Value>,
    error_detail: Option<String>,
    progress_message: Option<String>,
    created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Body of `GET /tasks/{uuid}`.
#[derive(Debug, Deserialize)]
struct TaskPoll {
    status: String,
    #[serde(default)]
    percentage_complete: Option<u64>,
    #[serde(default)]
    error_detail: Option<String>,
    #[serde(default)]
    progress_message: Option<String>,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    completion_time: Option<String>,
}

impl Task {
    /// A handle for a known task that has not been polled yet.
    #[must_use]
    pub const fn new(uuid: TaskUuid) -> Self {
        Self {
            uuid,
            status: TaskStatus::Queued,
            percentage_complete: 0,
            result: None,
            error_detail: None,
            progress_message: None,
            created_at: None,
            completed_at: None,
        }
    }

    /// Extract the task reference from a mutation response.
    ///
    /// Checks the top-level `task_uuid` first, then
    /// `status.execution_context.task_uuid`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if neither location holds a task uuid.
    pub fn from_response(document: &Value) -> Result<Self> {
        let uuid = document
            .get("task_uuid")
            .and_then(Value::as_str)
            .or_else(|| {
                document
                    .pointer("/status/execution_context/task_uuid")
                    .and_then(Value::as_str)
            })
            .ok_or_else(|| {
                Error::InvalidResponse(format!("Response carries no task reference: {document}"))
            })?;
        let uuid = uuid
            .parse()
            .map_err(|_| Error::InvalidResponse(format!("Invalid task uuid `{uuid}`")))?;
        Ok(Self::new(uuid))
    }

    /// Task identifier.
    #[must_use]
    pub const fn uuid(&self) -> &TaskUuid {
        &self.uuid
    }

    /// Last observed status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Highest completion percentage observed.
    #[must_use]
    pub const fn percentage_complete(&self) -> u8 {
        self.percentage_complete
    }

    /// The final poll document; set only once the task has succeeded.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Server error detail; set only once the task has failed or aborted.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Latest progress message.
    #[must_use]
    pub fn progress_message(&self) -> Option<&str> {
        self.progress_message.as_deref()
    }

    /// When the server created the task.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// When the task reached a terminal state.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns true once the task can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Uuid of the first entity the task acted on, from `entity_reference_list`.
    #[must_use]
    pub fn entity_uuid(&self) -> Option<EntityUuid> {
        self.result
            .as_ref()?
            .get("entity_reference_list")?
            .as_array()?
            .iter()
            .find_map(|reference| reference.get("uuid").and_then(Value::as_str))
            .and_then(|uuid| uuid.parse().ok())
    }

    /// Apply one poll document.
    fn advance(&mut self, document: Value) -> Result<()> {
        let poll: TaskPoll = serde_json::from_value(document.clone()).map_err(|err| {
            Error::InvalidResponse(format!("Malformed task {} poll: {err}", self.uuid))
        })?;
        let observed: TaskStatus = poll.status.parse()?;

        if observed.rank() < self.status.rank() {
            warn!(
                task = %self.uuid,
                current = %self.status,
                %observed,
                "ignoring task status regression"
            );
        } else {
            self.status = observed;
        }

        if let Some(percent) = poll.percentage_complete {
            let percent = u8::try_from(percent.min(100)).unwrap_or(100);
            self.percentage_complete = self.percentage_complete.max(percent);
        }
        if poll.progress_message.is_some() {
            self.progress_message = poll.progress_message;
        }
        if self.created_at.is_none() {
            self.created_at = poll.creation_time.as_deref().and_then(parse_time);
        }

        match self.status {
            TaskStatus::Succeeded => {
                self.percentage_complete = 100;
                self.completed_at = poll.completion_time.as_deref().and_then(parse_time);
                self.result = Some(document);
            }
            TaskStatus::Failed | TaskStatus::Aborted => {
                self.completed_at = poll.completion_time.as_deref().and_then(parse_time);
                self.error_detail = Some(poll.error_detail.unwrap_or_default());
            }
            TaskStatus::Queued | TaskStatus::Running => {}
        }
        Ok(())
    }

    /// Convert a terminal task into the caller-facing outcome.
    fn into_outcome(self) -> Result<Self> {
        match self.status {
            TaskStatus::Failed | TaskStatus::Aborted => Err(Error::TaskFailed {
                task_uuid: self.uuid.to_string(),
                status: self.status,
                detail: self.error_detail.unwrap_or_default(),
            }),
            _ => Ok(self),
        }
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Submits mutations and follows their tasks to completion.
#[derive(Clone)]
pub struct TaskTracker {
    transport: Arc<dyn Transport>,
}

impl TaskTracker {
    /// Create a tracker dispatching through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Dispatch a mutation and return its task handle without waiting.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or `InvalidResponse` if the response carries no
    /// task reference.
    pub async fn submit(&self, request: ApiRequest) -> Result<Task> {
        let response = self.transport.dispatch(request).await?;
        Task::from_response(&response)
    }

    /// Poll the task once and return the advanced handle.
    ///
    /// A terminal task is returned as-is without a request.
    ///
    /// # Errors
    ///
    /// Returns the transport error or `InvalidResponse` for a malformed poll.
    pub async fn refresh(&self, task: &Task) -> Result<Task> {
        let mut task = task.clone();
        if !task.is_terminal() {
            self.poll(&mut task).await?;
        }
        Ok(task)
    }

    /// Poll until the task is terminal.
    ///
    /// # Errors
    ///
    /// * `TaskFailed` - the task ended `FAILED` or `ABORTED`; carries the server detail
    /// * `Timeout` - the policy deadline passed first
    /// * `Cancelled` - `cancel` fired
    ///
    /// After `Timeout` or `Cancelled` the same handle may be waited on again.
    pub async fn wait(
        &self,
        task: &Task,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        let started = Instant::now();
        let mut task = task.clone();

        loop {
            if task.is_terminal() {
                return task.into_outcome();
            }
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(format!("wait for task {}", task.uuid)));
            }
            if policy.is_expired(started.elapsed()) {
                return Err(Error::Timeout(format!(
                    "task {} still {} after {:?}",
                    task.uuid,
                    task.status,
                    started.elapsed()
                )));
            }

            self.poll(&mut task).await?;
            if task.is_terminal() {
                continue;
            }

            let delay = policy.next_delay(started.elapsed());
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(Error::Cancelled(format!("wait for task {}", task.uuid)));
                }
                () = sleep(delay) => {}
            }
        }
    }

    /// Submit a mutation and wait for its task.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`] and [`Self::wait`].
    pub async fn submit_and_wait(
        &self,
        request: ApiRequest,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Task> {
        let task = self.submit(request).await?;
        self.wait(&task, policy, cancel).await
    }

    async fn poll(&self, task: &mut Task) -> Result<()> {
        let document = self
            .transport
            .dispatch(ApiRequest::get(format!("/tasks/{}", task.uuid)))
            .await?;
        task.advance(document)?;
        debug!(
            task = %task.uuid,
            status = %task.status,
            percent = task.percentage_complete,
            "polled task"
        );
        Ok(())
    }
}
