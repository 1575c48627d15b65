//! Poller: drive every file of a batch to a terminal state.
//!
//! Each file moves through `pending → {done, failed, timeout}` and nothing
//! else. [`BatchTracker`] is the state machine made explicit: it owns the
//! per-file states, consumes status results as discrete events, and refuses
//! double transitions. The tracker has no I/O at all, so every transition is
//! unit-testable; [`poll_batch`] wraps it in the timing loop and performs the
//! downloads a `done` signal triggers.
//!
//! ## Failure asymmetry
//!
//! A transport or protocol failure on the status request itself propagates
//! and aborts the whole loop — the status endpoint speaks for the batch as a
//! whole. A failure fetching one file's result archive is recorded as that
//! file's download outcome and the loop carries on.
//!
//! ## Bounded termination
//!
//! The loop re-checks the deadline before every status request, so total
//! wall time is at most `max_wait` plus one request latency plus one
//! poll-interval sleep. Files still pending at the deadline are reported as
//! timed out, never silently dropped.

use crate::client::{FileExtractResult, StatusSource};
use crate::config::{BatchConfig, OutputFormat};
use crate::error::Mineru2MdError;
use crate::pipeline::unpack;
use crate::report::{FileOutcome, Stage};
use std::collections::BTreeMap;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Per-file poll state. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Done,
    Failed,
    TimedOut,
}

impl FileState {
    pub fn is_terminal(self) -> bool {
        self != FileState::Pending
    }
}

/// Transition event produced by feeding one status result to the tracker.
#[derive(Debug, PartialEq, Eq)]
pub enum FileEvent {
    /// The service finished the file; `zip_url` is where its result archive
    /// lives (absent when the service violated the contract).
    Done {
        file: String,
        zip_url: Option<String>,
    },
    /// The service gave up on the file.
    Failed { file: String, message: String },
}

/// Explicit finite-state tracker for one poll loop.
///
/// Owned exclusively by the poller for the duration of one batch; never
/// shared across batches. Initialised `Pending` for every file the uploader
/// reported as successfully uploaded.
#[derive(Debug)]
pub struct BatchTracker {
    states: BTreeMap<String, FileState>,
}

impl BatchTracker {
    pub fn new<I, S>(expected_files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: expected_files
                .into_iter()
                .map(|name| (name.into(), FileState::Pending))
                .collect(),
        }
    }

    /// True once every tracked file is terminal.
    pub fn is_complete(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    pub fn state(&self, file: &str) -> Option<FileState> {
        self.states.get(file).copied()
    }

    /// Feed one remote status result to the state machine.
    ///
    /// Returns the transition it caused, or `None` when the result is a
    /// no-op: an unknown file, a file already terminal, a result without a
    /// file name, or a state string the contract does not define ("running"
    /// and friends leave the file pending).
    pub fn apply(&mut self, result: &FileExtractResult) -> Option<FileEvent> {
        let name = result.file_name.as_deref()?;
        let state = self.states.get_mut(name)?;
        if state.is_terminal() {
            return None;
        }
        match result.state.as_deref() {
            Some("done") => {
                *state = FileState::Done;
                Some(FileEvent::Done {
                    file: name.to_string(),
                    zip_url: result.full_zip_url.clone().filter(|u| !u.is_empty()),
                })
            }
            Some("failed") => {
                *state = FileState::Failed;
                Some(FileEvent::Failed {
                    file: name.to_string(),
                    message: result
                        .err_msg
                        .clone()
                        .filter(|m| !m.is_empty())
                        .unwrap_or_else(|| "unknown error".to_string()),
                })
            }
            _ => None,
        }
    }

    /// Mark every still-pending file as timed out, returning their names.
    pub fn expire_pending(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for (name, state) in self.states.iter_mut() {
            if *state == FileState::Pending {
                *state = FileState::TimedOut;
                expired.push(name.clone());
            }
        }
        expired
    }
}

/// Poll the batch status endpoint until every file is terminal or the
/// deadline passes, triggering download+unpack+relocation on each `done`.
///
/// Returns one terminal outcome per expected file, in the order terminal
/// signals arrived (timeouts last). Status-request failures propagate.
pub async fn poll_batch(
    source: &dyn StatusSource,
    batch_id: &str,
    expected_files: &[String],
    config: &BatchConfig,
    format: OutputFormat,
) -> Result<Vec<FileOutcome>, Mineru2MdError> {
    let mut tracker = BatchTracker::new(expected_files.iter().cloned());
    let mut outcomes = Vec::with_capacity(expected_files.len());
    let deadline = Instant::now() + config.max_wait;

    while !tracker.is_complete() && Instant::now() < deadline {
        let results = source.fetch_batch_status(batch_id).await?;
        debug!(batch_id = %batch_id, results = results.len(), "status poll");

        // Results are processed in the order the API returned them, which is
        // not necessarily submission order.
        for result in &results {
            match tracker.apply(result) {
                Some(FileEvent::Done { file, zip_url }) => {
                    outcomes.push(handle_done(source, &file, zip_url, config, format).await);
                }
                Some(FileEvent::Failed { file, message }) => {
                    warn!(file = %file, error = %message, "remote conversion failed");
                    outcomes.push(FileOutcome::error(file, Stage::Convert, message));
                }
                None => {}
            }
        }

        if !tracker.is_complete() {
            sleep(config.poll_interval).await;
        }
    }

    for file in tracker.expire_pending() {
        warn!(file = %file, "conversion timed out");
        outcomes.push(FileOutcome::error(
            file,
            Stage::Convert,
            "timed out waiting for conversion",
        ));
    }

    info!(
        batch_id = %batch_id,
        completed = outcomes.iter().filter(|o| o.is_success()).count(),
        total = expected_files.len(),
        "poll loop finished"
    );
    Ok(outcomes)
}

/// Fetch and process one finished file's result archive.
///
/// Transport failures here are this file's problem only — they become a
/// download-stage error outcome, never an abort.
async fn handle_done(
    source: &dyn StatusSource,
    file: &str,
    zip_url: Option<String>,
    config: &BatchConfig,
    format: OutputFormat,
) -> FileOutcome {
    let Some(zip_url) = zip_url else {
        return FileOutcome::error(
            file,
            Stage::Download,
            "state is done but no download link was provided",
        );
    };

    let bytes = match source.fetch_archive(&zip_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %file, error = %e, "archive download failed");
            return FileOutcome::error(file, Stage::Download, format!("download failed: {e}"));
        }
    };

    // Zip extraction and relocation are synchronous fs work; keep them off
    // the async runtime.
    let file_name = file.to_string();
    let output_dir = config.output_dir.clone();
    let rename = config.rename_assets;
    match tokio::task::spawn_blocking(move || {
        unpack::unpack_and_relocate(&bytes, &file_name, &output_dir, format, rename)
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => FileOutcome::error(
            file,
            Stage::Download,
            format!("archive processing panicked: {e}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    fn result(name: &str, state: &str) -> FileExtractResult {
        FileExtractResult {
            file_name: Some(name.to_string()),
            state: Some(state.to_string()),
            full_zip_url: None,
            err_msg: None,
        }
    }

    #[test]
    fn tracker_transitions_pending_to_done() {
        let mut tracker = BatchTracker::new(["a.pdf"]);
        assert_eq!(tracker.state("a.pdf"), Some(FileState::Pending));

        let mut done = result("a.pdf", "done");
        done.full_zip_url = Some("http://x/a.zip".to_string());
        let event = tracker.apply(&done).unwrap();
        assert_eq!(
            event,
            FileEvent::Done {
                file: "a.pdf".to_string(),
                zip_url: Some("http://x/a.zip".to_string()),
            }
        );
        assert_eq!(tracker.state("a.pdf"), Some(FileState::Done));
        assert!(tracker.is_complete());
    }

    #[test]
    fn tracker_failed_uses_err_msg_or_fallback() {
        let mut tracker = BatchTracker::new(["a.pdf", "b.pdf"]);

        let mut failed = result("a.pdf", "failed");
        failed.err_msg = Some("page limit exceeded".to_string());
        assert_eq!(
            tracker.apply(&failed).unwrap(),
            FileEvent::Failed {
                file: "a.pdf".to_string(),
                message: "page limit exceeded".to_string(),
            }
        );

        assert_eq!(
            tracker.apply(&result("b.pdf", "failed")).unwrap(),
            FileEvent::Failed {
                file: "b.pdf".to_string(),
                message: "unknown error".to_string(),
            }
        );
    }

    #[test]
    fn tracker_ignores_unknown_files_states_and_double_signals() {
        let mut tracker = BatchTracker::new(["a.pdf"]);

        // unknown file
        assert!(tracker.apply(&result("other.pdf", "done")).is_none());
        // undefined state string leaves the file pending
        assert!(tracker.apply(&result("a.pdf", "running")).is_none());
        assert_eq!(tracker.state("a.pdf"), Some(FileState::Pending));
        // missing file name
        let nameless = FileExtractResult {
            file_name: None,
            state: Some("done".to_string()),
            full_zip_url: None,
            err_msg: None,
        };
        assert!(tracker.apply(&nameless).is_none());

        // first terminal signal wins, second is a no-op
        assert!(tracker.apply(&result("a.pdf", "done")).is_some());
        assert!(tracker.apply(&result("a.pdf", "failed")).is_none());
        assert_eq!(tracker.state("a.pdf"), Some(FileState::Done));
    }

    #[test]
    fn expire_pending_marks_only_pending_files() {
        let mut tracker = BatchTracker::new(["a.pdf", "b.pdf"]);
        tracker.apply(&result("a.pdf", "done"));
        let expired = tracker.expire_pending();
        assert_eq!(expired, vec!["b.pdf".to_string()]);
        assert_eq!(tracker.state("b.pdf"), Some(FileState::TimedOut));
        assert_eq!(tracker.state("a.pdf"), Some(FileState::Done));
    }

    /// Fake status source: replays a fixed response forever and fails every
    /// archive fetch, so `done` files exercise the download-error path.
    struct FakeSource {
        responses: Mutex<Vec<Vec<FileExtractResult>>>,
        last: Vec<FileExtractResult>,
    }

    #[async_trait]
    impl StatusSource for FakeSource {
        async fn fetch_batch_status(
            &self,
            _batch_id: &str,
        ) -> Result<Vec<FileExtractResult>, Mineru2MdError> {
            let mut responses = self.responses.lock().unwrap();
            Ok(if responses.is_empty() {
                self.last.clone()
            } else {
                responses.remove(0)
            })
        }

        async fn fetch_archive(&self, _zip_url: &str) -> Result<Vec<u8>, Mineru2MdError> {
            Err(Mineru2MdError::Internal("no archive in fake".to_string()))
        }
    }

    fn fast_config() -> BatchConfig {
        BatchConfig {
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_millis(200),
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn done_failed_and_pending_each_get_one_terminal_outcome() {
        let mut done = result("a.pdf", "done");
        done.full_zip_url = Some("http://unused/a.zip".to_string());
        let mut failed = result("b.pdf", "failed");
        failed.err_msg = Some("broken".to_string());
        // c.pdf never appears with a terminal state
        let source = FakeSource {
            responses: Mutex::new(vec![]),
            last: vec![done, failed, result("c.pdf", "running")],
        };

        let expected: Vec<String> = ["a.pdf", "b.pdf", "c.pdf"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcomes = poll_batch(
            &source,
            "batch-1",
            &expected,
            &fast_config(),
            OutputFormat::Markdown,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 3);
        let for_file = |name: &str| outcomes.iter().find(|o| o.file == name).unwrap();
        let a = for_file("a.pdf");
        assert_eq!(a.stage, Stage::Download);
        assert!(a.message.contains("download failed"));
        let b = for_file("b.pdf");
        assert_eq!(b.stage, Stage::Convert);
        assert_eq!(b.message, "broken");
        let c = for_file("c.pdf");
        assert_eq!(c.stage, Stage::Convert);
        assert!(c.message.contains("timed out"));
    }

    #[tokio::test]
    async fn done_without_zip_url_is_a_download_error() {
        let source = FakeSource {
            responses: Mutex::new(vec![]),
            last: vec![result("a.pdf", "done")],
        };
        let outcomes = poll_batch(
            &source,
            "batch-1",
            &["a.pdf".to_string()],
            &fast_config(),
            OutputFormat::Markdown,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].stage, Stage::Download);
        assert!(outcomes[0].message.contains("no download link"));
    }

    /// Status source whose every status request errors.
    struct BrokenSource;

    #[async_trait]
    impl StatusSource for BrokenSource {
        async fn fetch_batch_status(
            &self,
            _batch_id: &str,
        ) -> Result<Vec<FileExtractResult>, Mineru2MdError> {
            Err(Mineru2MdError::Api {
                message: "status endpoint rejected the batch".to_string(),
            })
        }

        async fn fetch_archive(&self, _zip_url: &str) -> Result<Vec<u8>, Mineru2MdError> {
            unreachable!("poll never gets that far")
        }
    }

    #[tokio::test]
    async fn status_request_failure_aborts_the_loop() {
        let err = poll_batch(
            &BrokenSource,
            "batch-1",
            &["a.pdf".to_string()],
            &fast_config(),
            OutputFormat::Markdown,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Mineru2MdError::Api { .. }));
    }
}
