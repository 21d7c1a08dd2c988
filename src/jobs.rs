use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::bulk::{BulkAction, BulkReport, run_bulk};
use crate::domain::AdminError;
use crate::record::Record;
use crate::repository::Repository;
use crate::resource::Resource;

/// Repository work done off the UI thread.
#[derive(Debug)]
pub enum Job {
    Load(Resource),
    Save {
        resource: Resource,
        record: Record,
        create: bool,
    },
    SetStatus {
        resource: Resource,
        id: String,
        status: String,
        label: String,
    },
    Delete {
        resource: Resource,
        id: String,
    },
    Bulk {
        resource: Resource,
        action: BulkAction,
        ids: Vec<String>,
        export_dir: PathBuf,
    },
}

#[derive(Debug)]
pub enum JobOutcome {
    Loaded(Resource, Result<Vec<Record>, AdminError>),
    Saved {
        created: bool,
        result: Result<Record, AdminError>,
    },
    StatusChanged {
        label: String,
        result: Result<Record, AdminError>,
    },
    Deleted {
        id: String,
        result: Result<(), AdminError>,
    },
    Bulk(BulkReport),
}

#[derive(Debug)]
pub struct JobResult {
    /// View generation the job was started for.
    pub generation: u64,
    keys: Vec<String>,
    pub outcome: JobOutcome,
}

impl Job {
    /// Records this job mutates, as guard keys.
    fn keys(&self) -> Vec<String> {
        match self {
            Job::Load(_) => Vec::new(),
            Job::Save {
                resource, record, ..
            } if !record.id.is_empty() => vec![guard_key(*resource, &record.id)],
            Job::Save { .. } => Vec::new(),
            Job::SetStatus { resource, id, .. } | Job::Delete { resource, id } => {
                vec![guard_key(*resource, id)]
            }
            Job::Bulk { resource, ids, .. } => ids.iter().map(|id| guard_key(*resource, id)).collect(),
        }
    }

    fn run(self, repo: &dyn Repository) -> JobOutcome {
        match self {
            Job::Load(resource) => JobOutcome::Loaded(resource, repo.list(resource)),
            Job::Save {
                resource,
                record,
                create,
            } => {
                let result = if create {
                    repo.create(resource, record)
                } else {
                    repo.update(resource, record)
                };
                JobOutcome::Saved { created: create, result }
            }
            Job::SetStatus {
                resource,
                id,
                status,
                label,
            } => JobOutcome::StatusChanged {
                label,
                result: repo.set_status(resource, &id, &status),
            },
            Job::Delete { resource, id } => {
                let result = repo.delete(resource, &id);
                JobOutcome::Deleted { id, result }
            }
            Job::Bulk {
                resource,
                action,
                ids,
                export_dir,
            } => JobOutcome::Bulk(run_bulk(repo, resource, action, &ids, &export_dir)),
        }
    }
}

fn guard_key(resource: Resource, id: &str) -> String {
    format!("{}:{id}", resource.key())
}

/// Records with a mutation in flight.
#[derive(Debug, Default)]
pub struct InFlight {
    pending: HashSet<String>,
}

impl InFlight {
    /// Claim all keys, or none of them when one is already taken.
    pub fn acquire(&mut self, keys: &[String]) -> Result<(), AdminError> {
        if let Some(taken) = keys.iter().find(|k| self.pending.contains(*k)) {
            let id = taken.split_once(':').map(|(_, id)| id).unwrap_or(taken);
            return Err(AdminError::InFlight(id.to_string()));
        }
        self.pending.extend(keys.iter().cloned());
        Ok(())
    }

    pub fn release(&mut self, keys: &[String]) {
        for key in keys {
            self.pending.remove(key);
        }
    }

    pub fn is_pending(&self, resource: Resource, id: &str) -> bool {
        self.pending.contains(&guard_key(resource, id))
    }
}

/// Threads for repository calls, separate from the global pool used by the filter scan.
const JOB_THREADS: usize = 4;

/// Runs jobs on its own rayon pool and collects their results.
///
/// Blocking repository calls must not occupy the global pool the row scans run on.
pub struct JobRunner {
    pool: ThreadPool,
    repo: Arc<dyn Repository>,
    tx: Sender<JobResult>,
    rx: Receiver<JobResult>,
    in_flight: InFlight,
    running: usize,
}

impl JobRunner {
    pub fn new(repo: Arc<dyn Repository>) -> Result<Self, AdminError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(JOB_THREADS)
            .thread_name(|idx| format!("repository-job-{idx}"))
            .build()?;
        let (tx, rx) = channel();
        Ok(JobRunner {
            pool,
            repo,
            tx,
            rx,
            in_flight: InFlight::default(),
            running: 0,
        })
    }

    pub fn submit(&mut self, generation: u64, job: Job) -> Result<(), AdminError> {
        let keys = job.keys();
        self.in_flight.acquire(&keys)?;
        self.running += 1;
        debug!("Submitting job {job:?} for generation {generation}");

        let repo = Arc::clone(&self.repo);
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let start_time = Instant::now();
            let outcome = job.run(repo.as_ref());
            trace!("Job finished in {}ms", start_time.elapsed().as_millis());
            // The receiver is gone when the model was dropped.
            let _ = tx.send(JobResult {
                generation,
                keys,
                outcome,
            });
        });
        Ok(())
    }

    fn settle(&mut self, result: JobResult) -> JobResult {
        self.running = self.running.saturating_sub(1);
        self.in_flight.release(&result.keys);
        result
    }

    pub fn try_next(&mut self) -> Option<JobResult> {
        let result = self.rx.try_recv().ok()?;
        Some(self.settle(result))
    }

    pub fn wait_next(&mut self, timeout: Duration) -> Option<JobResult> {
        if self.running == 0 {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(self.settle(result)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn is_pending(&self, resource: Resource, id: &str) -> bool {
        self.in_flight.is_pending(resource, id)
    }
}
