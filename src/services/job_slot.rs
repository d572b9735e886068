//! The process-wide job slot: one optimization run at a time, an append-only
//! progress log per run, and the terminal result once the run ends.
//!
//! Every mutation bumps a `watch` version counter so async readers (progress
//! streams, synchronous waiters) can sleep until something changes. The
//! current run's status is published separately on every transition, so
//! result polls never touch the slot lock.

use crate::config::GaConfig;
use crate::engines::generation::{GenerationRecord, ProgressEvent};
use crate::engines::report::RunReport;
use crate::error::{FeedmixError, Result};
use crate::types::{FeedItem, Requirement};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One run held by the slot.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub state: JobState,
    pub feeds: Vec<FeedItem>,
    pub requirement: Requirement,
    pub config: GaConfig,
    pub records: Vec<GenerationRecord>,
    pub result: Option<Arc<RunReport>>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    cancel: Arc<AtomicBool>,
}

/// What a result poll observes.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Idle,
    Pending,
    Ready(Arc<RunReport>),
    Failed(String),
}

/// Handed to the runner of a freshly admitted job.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub run_id: u64,
    pub total_gen: usize,
    pub cancel: Arc<AtomicBool>,
}

/// Which run a progress reader follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Following this run id.
    Run(u64),
    /// Waiting for the first run with an id above this one.
    After(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressRead {
    Events(Vec<ProgressEvent>),
    Wait,
    End,
}

/// Terminal outcomes kept after their run has left the slot.
pub const RETAINED_OUTCOMES: usize = 16;

#[derive(Debug)]
struct SlotInner {
    job: Option<Job>,
    last_id: u64,
    finished: VecDeque<(u64, RunStatus)>,
}

#[derive(Debug)]
pub struct JobSlot {
    inner: RwLock<SlotInner>,
    version: watch::Sender<u64>,
    status: watch::Sender<RunStatus>,
}

impl Default for JobSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSlot {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        let (status, _) = watch::channel(RunStatus::Idle);
        Self {
            inner: RwLock::new(SlotInner {
                job: None,
                last_id: 0,
                finished: VecDeque::with_capacity(RETAINED_OUTCOMES),
            }),
            version,
            status,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Receiver that changes on every slot mutation.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Admits a new run unless one is already running. The check and the
    /// replacement happen under one write lock.
    pub fn try_begin(
        &self,
        feeds: Vec<FeedItem>,
        requirement: Requirement,
        config: GaConfig,
    ) -> Result<JobTicket> {
        let ticket = {
            let mut inner = self.write();
            if inner.job.as_ref().is_some_and(|job| job.state == JobState::Running) {
                return Err(FeedmixError::AlreadyRunning);
            }

            inner.last_id += 1;
            let cancel = Arc::new(AtomicBool::new(false));
            let ticket = JobTicket {
                run_id: inner.last_id,
                total_gen: config.max_generations,
                cancel: Arc::clone(&cancel),
            };
            inner.job = Some(Job {
                id: ticket.run_id,
                state: JobState::Running,
                feeds,
                requirement,
                records: Vec::new(),
                config,
                result: None,
                error: None,
                started_at: Utc::now(),
                cancel,
            });
            self.status.send_replace(RunStatus::Pending);
            ticket
        };
        self.bump();
        Ok(ticket)
    }

    /// Applies `f` to the job with `run_id` while it is still running. A
    /// transition into a terminal state is published and retained.
    fn update_running<F>(&self, run_id: u64, f: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let applied = {
            let mut guard = self.write();
            let inner = &mut *guard;
            match inner.job.as_mut() {
                Some(job) if job.id == run_id && job.state == JobState::Running => {
                    f(job);
                    if job.state.is_terminal() {
                        let status = status_of(job);
                        if inner.finished.len() == RETAINED_OUTCOMES {
                            inner.finished.pop_front();
                        }
                        inner.finished.push_back((run_id, status.clone()));
                        self.status.send_replace(status);
                    }
                    true
                }
                _ => false,
            }
        };
        if applied {
            self.bump();
        }
        applied
    }

    pub fn append_record(&self, run_id: u64, record: GenerationRecord) -> bool {
        self.update_running(run_id, |job| job.records.push(record))
    }

    pub fn complete(&self, run_id: u64, report: RunReport) -> bool {
        self.update_running(run_id, |job| {
            job.state = JobState::Completed;
            job.result = Some(Arc::new(report));
        })
    }

    pub fn fail(&self, run_id: u64, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update_running(run_id, |job| {
            job.state = JobState::Failed;
            job.error = Some(message);
        })
    }

    /// Requests cancellation of the running job and returns its id.
    pub fn cancel(&self) -> Result<u64> {
        let inner = self.read();
        match inner.job.as_ref() {
            Some(job) if job.state == JobState::Running => {
                job.cancel.store(true, Ordering::Relaxed);
                Ok(job.id)
            }
            _ => Err(FeedmixError::NotRunning),
        }
    }

    pub fn state(&self) -> JobState {
        self.read()
            .job
            .as_ref()
            .map_or(JobState::Idle, |job| job.state)
    }

    pub fn last_id(&self) -> u64 {
        self.read().last_id
    }

    /// Copy of the current job, if any.
    pub fn snapshot(&self) -> Option<Job> {
        self.read().job.clone()
    }

    /// Side-effect free view of the current job's outcome.
    pub fn poll(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    /// Outcome of a specific run: `None` while it is still running. Terminal
    /// outcomes stay readable for the last [`RETAINED_OUTCOMES`] runs, even
    /// after a newer run took the slot.
    pub fn outcome_of(&self, run_id: u64) -> Result<Option<RunStatus>> {
        let inner = self.read();
        if let Some(job) = inner.job.as_ref() {
            if job.id == run_id && job.state == JobState::Running {
                return Ok(None);
            }
        }
        inner
            .finished
            .iter()
            .rev()
            .find(|(id, _)| *id == run_id)
            .map(|(_, status)| Some(status.clone()))
            .ok_or_else(|| {
                FeedmixError::RunFailure(format!("run {} is no longer available", run_id))
            })
    }

    /// Where a reader attaching now should bind: the job in the slot, running
    /// or finished, or the first run of a slot that never held one.
    pub fn bind_subscriber(&self) -> Binding {
        let inner = self.read();
        match inner.job.as_ref() {
            Some(job) => Binding::Run(job.id),
            None => Binding::After(inner.last_id),
        }
    }

    /// Progress of the bound run from `cursor` on. An `After` binding is
    /// upgraded in place once a newer run appears.
    pub fn read_progress(&self, binding: &mut Binding, cursor: usize) -> ProgressRead {
        let inner = self.read();
        let Some(job) = inner.job.as_ref() else {
            return ProgressRead::Wait;
        };

        if let Binding::After(last_seen) = *binding {
            if job.id <= last_seen {
                return ProgressRead::Wait;
            }
            *binding = Binding::Run(job.id);
        }

        match *binding {
            Binding::Run(id) if id == job.id => {
                if cursor < job.records.len() {
                    let total = job.config.max_generations;
                    ProgressRead::Events(
                        job.records[cursor..]
                            .iter()
                            .map(|record| ProgressEvent::from_record(record, total))
                            .collect(),
                    )
                } else if job.state.is_terminal() {
                    ProgressRead::End
                } else {
                    ProgressRead::Wait
                }
            }
            _ => ProgressRead::End,
        }
    }
}

fn status_of(job: &Job) -> RunStatus {
    match job.state {
        JobState::Idle => RunStatus::Idle,
        JobState::Running => RunStatus::Pending,
        JobState::Completed => match &job.result {
            Some(report) => RunStatus::Ready(Arc::clone(report)),
            None => RunStatus::Failed("completed run has no result".to_string()),
        },
        JobState::Failed => RunStatus::Failed(
            job.error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(slot: &JobSlot) -> Result<JobTicket> {
        slot.try_begin(
            vec![FeedItem::new("a", 1.0, 1.0, 1.0)],
            Requirement::new(1.0, 1.0),
            GaConfig::default().with_max_generations(10),
        )
    }

    fn record(generation: usize) -> GenerationRecord {
        GenerationRecord {
            generation,
            best_fitness: 0.5,
            avg_fitness: 0.4,
            median_fitness: 0.4,
            worst_fitness: 0.1,
            diversity: 0.2,
            best_cost: 1.0,
            best_prdd: 1.0,
            best_mp: 1.0,
            best_composition: vec![1.0],
        }
    }

    #[test]
    fn test_second_begin_is_rejected_while_running() {
        let slot = JobSlot::new();
        assert_eq!(slot.state(), JobState::Idle);

        let ticket = begin(&slot).unwrap();
        assert_eq!(ticket.run_id, 1);
        assert_eq!(ticket.total_gen, 10);
        assert!(matches!(begin(&slot), Err(FeedmixError::AlreadyRunning)));
        assert_eq!(slot.state(), JobState::Running);

        assert!(slot.fail(ticket.run_id, "boom"));
        assert_eq!(begin(&slot).unwrap().run_id, 2);
    }

    #[test]
    fn test_poll_is_idempotent() {
        let slot = JobSlot::new();
        assert_eq!(slot.poll(), RunStatus::Idle);

        let ticket = begin(&slot).unwrap();
        assert_eq!(slot.poll(), RunStatus::Pending);
        assert_eq!(slot.poll(), RunStatus::Pending);

        slot.fail(ticket.run_id, "boom");
        for _ in 0..5 {
            assert_eq!(slot.poll(), RunStatus::Failed("boom".to_string()));
        }
    }

    #[test]
    fn test_stale_run_cannot_write() {
        let slot = JobSlot::new();
        let first = begin(&slot).unwrap();
        slot.fail(first.run_id, "boom");
        let second = begin(&slot).unwrap();

        assert!(!slot.append_record(first.run_id, record(1)));
        assert!(!slot.fail(first.run_id, "late"));
        assert!(slot.append_record(second.run_id, record(1)));
        assert_eq!(slot.snapshot().unwrap().records.len(), 1);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let slot = JobSlot::new();
        let ticket = begin(&slot).unwrap();
        slot.fail(ticket.run_id, "first");

        assert!(!slot.fail(ticket.run_id, "second"));
        assert!(!slot.append_record(ticket.run_id, record(1)));
        assert_eq!(slot.poll(), RunStatus::Failed("first".to_string()));
    }

    #[test]
    fn test_cancel_sets_token() {
        let slot = JobSlot::new();
        assert!(matches!(slot.cancel(), Err(FeedmixError::NotRunning)));

        let ticket = begin(&slot).unwrap();
        assert_eq!(slot.cancel().unwrap(), ticket.run_id);
        assert!(ticket.cancel.load(Ordering::Relaxed));
    }

    #[test]
    fn test_progress_reader_follows_bound_run() {
        let slot = JobSlot::new();
        let mut binding = slot.bind_subscriber();
        assert_eq!(binding, Binding::After(0));
        assert_eq!(slot.read_progress(&mut binding, 0), ProgressRead::Wait);

        let ticket = begin(&slot).unwrap();
        slot.append_record(ticket.run_id, record(1));
        slot.append_record(ticket.run_id, record(2));

        match slot.read_progress(&mut binding, 0) {
            ProgressRead::Events(events) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[1].current_gen, 2);
                assert_eq!(events[1].total_gen, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(binding, Binding::Run(ticket.run_id));
        assert_eq!(slot.read_progress(&mut binding, 2), ProgressRead::Wait);

        slot.fail(ticket.run_id, "boom");
        assert_eq!(slot.read_progress(&mut binding, 2), ProgressRead::End);

        // A later run does not leak into a finished binding.
        let next = begin(&slot).unwrap();
        slot.append_record(next.run_id, record(1));
        assert_eq!(slot.read_progress(&mut binding, 0), ProgressRead::End);
    }

    #[test]
    fn test_outcome_of() {
        let slot = JobSlot::new();
        let ticket = begin(&slot).unwrap();
        assert_eq!(slot.outcome_of(ticket.run_id).unwrap(), None);

        slot.fail(ticket.run_id, "boom");
        assert_eq!(
            slot.outcome_of(ticket.run_id).unwrap(),
            Some(RunStatus::Failed("boom".to_string()))
        );
        assert!(slot.outcome_of(ticket.run_id + 1).is_err());
    }

    #[test]
    fn test_outcome_survives_replacement() {
        let slot = JobSlot::new();
        let first = begin(&slot).unwrap();
        slot.fail(first.run_id, "first");
        let second = begin(&slot).unwrap();

        assert_eq!(
            slot.outcome_of(first.run_id).unwrap(),
            Some(RunStatus::Failed("first".to_string()))
        );
        assert_eq!(slot.outcome_of(second.run_id).unwrap(), None);
        assert_eq!(slot.poll(), RunStatus::Pending);
    }

    #[test]
    fn test_old_outcomes_are_evicted() {
        let slot = JobSlot::new();
        let first = begin(&slot).unwrap();
        slot.fail(first.run_id, "oldest");

        for _ in 0..RETAINED_OUTCOMES {
            let ticket = begin(&slot).unwrap();
            slot.fail(ticket.run_id, "newer");
        }

        assert!(slot.outcome_of(first.run_id).is_err());
        assert_eq!(
            slot.outcome_of(first.run_id + 1).unwrap(),
            Some(RunStatus::Failed("newer".to_string()))
        );
    }

    #[test]
    fn test_late_reader_replays_finished_run() {
        let slot = JobSlot::new();
        let ticket = begin(&slot).unwrap();
        slot.append_record(ticket.run_id, record(1));
        slot.append_record(ticket.run_id, record(2));
        slot.fail(ticket.run_id, "boom");

        let mut binding = slot.bind_subscriber();
        assert_eq!(binding, Binding::Run(ticket.run_id));
        match slot.read_progress(&mut binding, 0) {
            ProgressRead::Events(events) => assert_eq!(events.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(slot.read_progress(&mut binding, 2), ProgressRead::End);
    }

    #[test]
    fn test_mutations_bump_version() {
        let slot = JobSlot::new();
        let rx = slot.watch();
        let before = *rx.borrow();

        let ticket = begin(&slot).unwrap();
        slot.append_record(ticket.run_id, record(1));

        assert_eq!(*rx.borrow(), before + 2);
    }
}
