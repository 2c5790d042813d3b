//! Batch processing over many files.
//!
//! Items run on a bounded pool of blocking workers. Each item ends in exactly
//! one of [`Summary::succeeded`] or [`Summary::failed`], including items
//! whose worker panicked; a failure never stops the remaining items.
//!
//! Progress and per-item results are published as [`BatchEvent`]s over a
//! `flume` channel. Item results are published in input order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::Sender;
use hashbrown::HashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::container::{Completed, ContainerError, DecryptRequest, EncryptRequest, decrypt_file, encrypt_file, read_header};
use crate::secret::Password;
use crate::types::{ProcessorMode, Progress};

mod buffer;
mod progress;

pub use buffer::Buffer;
pub use progress::{ItemProgress, Snapshot, Throughput};

/// One unit of work.
#[derive(Debug, Clone)]
pub enum Job {
    Encrypt(EncryptRequest),
    Decrypt(DecryptRequest),
}

impl Job {
    pub fn input(&self) -> &Path {
        match self {
            Self::Encrypt(request) => &request.input,
            Self::Decrypt(request) => &request.input,
        }
    }

    pub fn mode(&self) -> ProcessorMode {
        match self {
            Self::Encrypt(_) => ProcessorMode::Encrypt,
            Self::Decrypt(_) => ProcessorMode::Decrypt,
        }
    }

    pub fn run(&self, password: &Password, progress: Option<&dyn Progress>) -> Result<Completed, ContainerError> {
        match self {
            Self::Encrypt(request) => encrypt_file(request, password, progress),
            Self::Decrypt(request) => decrypt_file(request, password, progress),
        }
    }

    /// Plaintext bytes this job is expected to process.
    fn expected_bytes(&self) -> u64 {
        let on_disk = || fs::metadata(self.input()).map_or(0, |meta| meta.len());

        match self {
            Self::Encrypt(_) => on_disk(),
            Self::Decrypt(request) => read_header(&request.input).map_or_else(|_| on_disk(), |header| header.original_length()),
        }
    }
}

/// Notification published while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { items: usize, total_bytes: u64 },
    Progress(Snapshot),
    Succeeded { index: usize, completed: Completed },
    Failed { index: usize, input: PathBuf, reason: String },
}

#[derive(Debug)]
pub struct Failure {
    pub index: usize,
    pub input: PathBuf,
    pub error: ContainerError,
}

impl Failure {
    /// First line of the error message.
    pub fn reason(&self) -> String {
        first_line(&self.error)
    }
}

/// Outcome of a batch, both lists ordered by input index.
#[derive(Debug, Default)]
pub struct Summary {
    pub succeeded: Vec<(usize, Completed)>,
    pub failed: Vec<Failure>,
    pub elapsed: Duration,
}

impl Summary {
    #[inline]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Moves a failed item to the succeeded list after a later successful
    /// attempt. Returns `false` if `index` was not a failure.
    pub fn recover(&mut self, index: usize, completed: Completed) -> bool {
        let Some(pos) = self.failed.iter().position(|failure| failure.index == index) else {
            return false;
        };

        self.failed.remove(pos);
        let at = self.succeeded.partition_point(|(idx, _)| *idx < index);
        self.succeeded.insert(at, (index, completed));
        true
    }
}

/// Runs jobs with a shared password on a bounded worker pool.
pub struct Batch {
    password: Arc<Password>,
    workers: usize,
}

impl Batch {
    pub fn new(password: Arc<Password>, workers: usize) -> Self {
        Self { password, workers: workers.max(1) }
    }

    pub async fn run(&self, jobs: Vec<Job>, events: Option<Sender<BatchEvent>>) -> Summary {
        let started = Instant::now();
        let expected: Vec<u64> = jobs.iter().map(Job::expected_bytes).collect();
        let inputs: Vec<PathBuf> = jobs.iter().map(|job| job.input().to_path_buf()).collect();

        let tracker = Arc::new(Throughput::new(expected.iter().sum()));
        emit(events.as_ref(), BatchEvent::Started { items: jobs.len(), total_bytes: tracker.snapshot().total_bytes });

        debug!(items = jobs.len(), workers = self.workers, "starting batch");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut outstanding: HashSet<usize> = (0..jobs.len()).collect();
        let mut set = JoinSet::new();

        for (index, (job, expected)) in jobs.into_iter().zip(expected).enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let password = Arc::clone(&self.password);
            let item = ItemProgress::new(Arc::clone(&tracker), events.clone());

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, Err(ContainerError::Io(io::Error::other("worker pool closed"))));
                };

                let outcome = tokio::task::spawn_blocking(move || {
                    let result = job.run(&password, Some(&item));
                    item.top_up(expected);
                    result
                })
                .await;

                (index, outcome.unwrap_or_else(|err| Err(ContainerError::Io(io::Error::other(format!("worker panicked: {err}"))))))
            });
        }

        let mut summary = Summary::default();
        let mut buffer = Buffer::new(0);

        while let Some(joined) = set.join_next().await {
            let Ok((index, result)) = joined else {
                warn!("batch task was aborted");
                continue;
            };

            outstanding.remove(&index);
            for (index, result) in buffer.add(index, (index, result)) {
                record(&mut summary, events.as_ref(), index, &inputs[index], result);
            }
        }

        let mut orphaned: Vec<usize> = outstanding.into_iter().collect();
        orphaned.sort_unstable();
        for index in orphaned {
            let result = Err(ContainerError::Io(io::Error::other("worker stopped before reporting")));
            for (index, result) in buffer.add(index, (index, result)) {
                record(&mut summary, events.as_ref(), index, &inputs[index], result);
            }
        }

        for (index, result) in buffer.flush() {
            record(&mut summary, events.as_ref(), index, &inputs[index], result);
        }

        summary.elapsed = started.elapsed();
        info!(succeeded = summary.succeeded.len(), failed = summary.failed.len(), elapsed = ?summary.elapsed, "batch finished");
        summary
    }
}

fn record(summary: &mut Summary, events: Option<&Sender<BatchEvent>>, index: usize, input: &Path, result: Result<Completed, ContainerError>) {
    match result {
        Ok(completed) => {
            emit(events, BatchEvent::Succeeded { index, completed: completed.clone() });
            summary.succeeded.push((index, completed));
        }
        Err(error) => {
            warn!(input = %input.display(), error = %error, "item failed");
            emit(events, BatchEvent::Failed { index, input: input.to_path_buf(), reason: first_line(&error) });
            summary.failed.push(Failure { index, input: input.to_path_buf(), error });
        }
    }
}

#[inline]
fn emit(events: Option<&Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(events) = events {
        let _ = events.send(event);
    }
}

fn first_line(error: &ContainerError) -> String {
    error.to_string().lines().next().unwrap_or_default().to_owned()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::types::VariantChoice;

    fn encrypt_job(input: PathBuf) -> Job {
        Job::Encrypt(EncryptRequest { input, output: None, variant: VariantChoice::Auto, chunk_size: 4096, hint: None, obscure_name: false })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_batch_continues_past_failure() {
        let dir = TempDir::new().unwrap();
        let mut jobs = Vec::new();
        for i in 0..4 {
            let input = dir.path().join(format!("file{i}.txt"));
            fs::write(&input, vec![i as u8; 5000]).unwrap();
            jobs.push(encrypt_job(input));
        }
        fs::write(dir.path().join("file1.txt.lbx"), b"occupied").unwrap();

        let (tx, rx) = flume::unbounded();
        let batch = Batch::new(Arc::new(Password::new("correct horse")), 2);
        let summary = batch.run(jobs, Some(tx)).await;

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.succeeded.iter().map(|(idx, _)| *idx).collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].index, 1);
        assert!(matches!(summary.failed[0].error, ContainerError::DestinationExists(_)));

        let items: Vec<usize> = rx
            .drain()
            .filter_map(|event| match event {
                BatchEvent::Succeeded { index, .. } | BatchEvent::Failed { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(items, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_input_is_counted() {
        let dir = TempDir::new().unwrap();
        let batch = Batch::new(Arc::new(Password::new("correct horse")), 1);
        let summary = batch.run(vec![encrypt_job(dir.path().join("absent.txt"))], None).await;

        assert_eq!(summary.succeeded.len(), 0);
        assert_eq!(summary.failed.len(), 1);
        assert!(matches!(summary.failed[0].error, ContainerError::Io(_)));
    }

    #[test]
    fn test_recover_keeps_order() {
        let completed = |name: &str| Completed { input: PathBuf::from(name), output: PathBuf::from(name), variant: crate::types::Variant::File, bytes: 1 };
        let mut summary = Summary {
            succeeded: vec![(0, completed("a")), (2, completed("c"))],
            failed: vec![Failure { index: 1, input: PathBuf::from("b"), error: ContainerError::AuthenticationFailed }],
            elapsed: Duration::ZERO,
        };

        assert!(summary.recover(1, completed("b")));
        assert!(!summary.recover(1, completed("b")));
        assert_eq!(summary.succeeded.iter().map(|(idx, _)| *idx).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(summary.is_success());
    }
}
