//! Job orchestration: admits runs into the job slot, launches them in the
//! background and exposes progress, results, cancellation and waiting.

use crate::config::{AppConfig, GaConfig};
use crate::engines::generation::{DietProblem, ProgressEvent};
use crate::error::{FeedmixError, Result};
use crate::services::evolution_runner::EvolutionRunner;
use crate::services::job_slot::{Binding, JobSlot, JobState, ProgressRead, RunStatus};
use crate::types::{FeedItem, Requirement};
use crate::engines::report::RunReport;
use futures::stream::{self, Stream};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Partial override of the default run parameters. Every field is optional.
///
/// Counts are accepted as plain JSON numbers; anything that is not a
/// non-negative number falls back to the default like any other invalid value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub feeds: Option<Vec<FeedItem>>,
    #[serde(default)]
    pub required_prdd: Option<f64>,
    #[serde(default)]
    pub required_mp: Option<f64>,
    #[serde(default)]
    pub pop_size: Option<f64>,
    #[serde(default)]
    pub max_gen: Option<f64>,
    #[serde(default)]
    pub crossover_rate: Option<f64>,
    #[serde(default)]
    pub mutation_rate: Option<f64>,
}

/// Acknowledgement of an accepted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunTicket {
    pub run_id: u64,
    pub total_gen: usize,
}

/// Seed configuration served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Defaults {
    pub feeds: Vec<FeedItem>,
    pub requirement: Requirement,
    pub parameters: GaConfig,
}

fn count(value: f64) -> usize {
    if value.is_finite() && value >= 0.0 {
        value as usize
    } else {
        0
    }
}

pub struct Orchestrator {
    slot: Arc<JobSlot>,
    feeds: Vec<FeedItem>,
    requirement: Requirement,
    evolution: GaConfig,
    runner: Mutex<Option<EvolutionRunner>>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            slot: Arc::new(JobSlot::new()),
            feeds: config.defaults.feeds.clone(),
            requirement: config.defaults.requirement,
            evolution: config.evolution.clone(),
            runner: Mutex::new(None),
        }
    }

    pub fn slot(&self) -> &Arc<JobSlot> {
        &self.slot
    }

    pub fn get_defaults(&self) -> Defaults {
        Defaults {
            feeds: self.feeds.clone(),
            requirement: self.requirement,
            parameters: self.evolution.clone(),
        }
    }

    /// Merges a request over the defaults and normalizes the GA parameters.
    fn resolve(&self, request: RunRequest) -> (Vec<FeedItem>, Requirement, GaConfig) {
        let feeds = request.feeds.unwrap_or_else(|| self.feeds.clone());
        let requirement = Requirement::new(
            request.required_prdd.unwrap_or(self.requirement.required_prdd),
            request.required_mp.unwrap_or(self.requirement.required_mp),
        );

        let mut config = self.evolution.clone();
        if let Some(pop_size) = request.pop_size {
            config.population_size = count(pop_size);
        }
        if let Some(max_gen) = request.max_gen {
            config.max_generations = count(max_gen);
        }
        if let Some(rate) = request.crossover_rate {
            config.crossover_rate = rate;
        }
        if let Some(rate) = request.mutation_rate {
            config.mutation_rate = rate;
        }

        let (config, replaced) = config.normalize(&self.evolution);
        for field in replaced {
            warn!("Invalid {} in run request, using default", field);
        }

        (feeds, requirement, config)
    }

    /// Validates the request and launches a run. Returns before the first
    /// generation is evaluated.
    pub fn start(&self, request: RunRequest) -> Result<RunTicket> {
        let (feeds, requirement, config) = self.resolve(request);

        let problem = DietProblem::new(feeds.clone(), requirement, &config).map_err(|e| {
            warn!("Run rejected: {}", e);
            e
        })?;

        // Held from admission until the handle is stored, so handles are
        // replaced in admission order.
        let mut runner_slot = self.runner.lock().unwrap_or_else(PoisonError::into_inner);

        let ticket = self.slot.try_begin(feeds, requirement, config.clone()).map_err(|e| {
            warn!("Run rejected: {}", e);
            e
        })?;
        let accepted = RunTicket {
            run_id: ticket.run_id,
            total_gen: ticket.total_gen,
        };

        match EvolutionRunner::start(Arc::clone(&self.slot), ticket, problem, config) {
            Ok(runner) => {
                info!(
                    "Run {} accepted ({} generations)",
                    accepted.run_id, accepted.total_gen
                );
                if let Some(previous) = runner_slot.replace(runner) {
                    debug!("Released handle of run {}", previous.run_id());
                }
                Ok(accepted)
            }
            Err(e) => {
                self.slot.fail(accepted.run_id, e.to_string());
                Err(e)
            }
        }
    }

    pub fn poll_result(&self) -> RunStatus {
        self.slot.poll()
    }

    pub fn state(&self) -> JobState {
        self.slot.state()
    }

    /// Requests cancellation of the running job.
    pub fn cancel(&self) -> Result<u64> {
        let run_id = self.slot.cancel()?;
        info!("Cancellation requested for run {}", run_id);
        Ok(run_id)
    }

    /// Waits for `run_id` to reach a terminal state.
    pub async fn wait_for(&self, run_id: u64) -> Result<Arc<RunReport>> {
        let mut rx = self.slot.watch();
        loop {
            rx.borrow_and_update();
            match self.slot.outcome_of(run_id)? {
                Some(RunStatus::Ready(report)) => return Ok(report),
                Some(RunStatus::Failed(message)) => return Err(FeedmixError::RunFailure(message)),
                Some(RunStatus::Idle | RunStatus::Pending) | None => {
                    if rx.changed().await.is_err() {
                        return Err(FeedmixError::RunFailure(format!(
                            "run {} was abandoned",
                            run_id
                        )));
                    }
                }
            }
        }
    }

    /// Progress events for one subscriber. Binds to the job currently in the
    /// slot, running or finished, and replays it from the first generation;
    /// before any run it binds to the first one started. Ends when that job
    /// is terminal and fully delivered.
    pub fn subscribe_progress(&self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let subscriber = Subscriber {
            slot: Arc::clone(&self.slot),
            rx: self.slot.watch(),
            binding: self.slot.bind_subscriber(),
            cursor: 0,
            pending: VecDeque::new(),
        };

        stream::unfold(subscriber, |mut sub| async move {
            loop {
                if let Some(event) = sub.pending.pop_front() {
                    return Some((event, sub));
                }

                sub.rx.borrow_and_update();
                match sub.slot.read_progress(&mut sub.binding, sub.cursor) {
                    ProgressRead::Events(events) => {
                        sub.cursor += events.len();
                        sub.pending.extend(events);
                    }
                    ProgressRead::Wait => {
                        if sub.rx.changed().await.is_err() {
                            return None;
                        }
                    }
                    ProgressRead::End => return None,
                }
            }
        })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Ok(run_id) = self.slot.cancel() {
            info!("Shutting down, cancelled run {}", run_id);
        }
    }
}

/// Cursor of one progress subscriber.
struct Subscriber {
    slot: Arc<JobSlot>,
    rx: watch::Receiver<u64>,
    binding: Binding,
    cursor: usize,
    pending: VecDeque<ProgressEvent>,
}
