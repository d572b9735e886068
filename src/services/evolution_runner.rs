use crate::config::GaConfig;
use crate::engines::generation::{
    DietProblem, EvolutionEngine, GenerationRecord, LogProgressCallback, ProgressCallback,
    CANCELLED_MESSAGE,
};
use crate::engines::report::{build_report, RunReport};
use crate::error::{FeedmixError, Result};
use crate::services::job_slot::{JobSlot, JobTicket};
use chrono::Utc;
use log::{error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Failure message stored when the evolution thread panics.
pub const PANIC_MESSAGE: &str = "evolution thread panicked";

/// Progress callback that appends every generation to the job slot
struct SlotProgressCallback {
    slot: Arc<JobSlot>,
    run_id: u64,
    log: LogProgressCallback,
}

impl ProgressCallback for SlotProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        self.log.on_generation_start(generation);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord, hall_of_fame_size: usize) {
        self.log.on_generation_complete(record, hall_of_fame_size);
        if !self.slot.append_record(self.run_id, record.clone()) {
            warn!("Run {} no longer owns the job slot, dropping generation {}", self.run_id, record.generation);
        }
    }
}

/// Handle of a run executing on its own thread.
pub struct EvolutionRunner {
    run_id: u64,
    handle: Option<JoinHandle<()>>,
    cancel_flag: Arc<AtomicBool>,
}

impl EvolutionRunner {
    /// Start evolution in background thread
    pub fn start(
        slot: Arc<JobSlot>,
        ticket: JobTicket,
        problem: DietProblem,
        config: GaConfig,
    ) -> Result<Self> {
        let run_id = ticket.run_id;
        let cancel_flag = Arc::clone(&ticket.cancel);

        let handle = thread::Builder::new()
            .name(format!("evolution-{}", run_id))
            .spawn(move || Self::run_evolution(slot, ticket, problem, config))?;

        Ok(Self {
            run_id,
            handle: Some(handle),
            cancel_flag,
        })
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Blocks until the run thread exits.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Cancel the running evolution
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Run the evolution (called in background thread)
    fn run_evolution(slot: Arc<JobSlot>, ticket: JobTicket, problem: DietProblem, config: GaConfig) {
        let run_id = ticket.run_id;
        info!(
            "Evolution run {} started: {} feeds, population {}, generations {}",
            run_id,
            problem.gene_count(),
            config.population_size,
            config.max_generations
        );

        let started_at = Utc::now();
        let mut callback = SlotProgressCallback {
            slot: Arc::clone(&slot),
            run_id,
            log: LogProgressCallback::new(config.max_generations),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<RunReport> {
            let mut engine = EvolutionEngine::new(problem.clone(), config.clone())?
                .with_cancel_token(Arc::clone(&ticket.cancel));
            let outcome = engine.run(&mut callback)?;
            Ok(build_report(&problem, &config, &outcome, started_at, Utc::now()))
        }));

        match outcome {
            Ok(Ok(report)) => {
                info!(
                    "Evolution run {} complete: best cost {:.2}, fitness {:.6e}",
                    run_id, report.totals.cost, report.fitness
                );
                slot.complete(run_id, report);
            }
            Ok(Err(e)) => {
                let message = failure_message(e);
                if message == CANCELLED_MESSAGE {
                    info!("Evolution run {} cancelled", run_id);
                } else {
                    error!("Evolution run {} failed: {}", run_id, message);
                }
                slot.fail(run_id, message);
            }
            Err(_) => {
                error!("Evolution run {} panicked", run_id);
                slot.fail(run_id, PANIC_MESSAGE);
            }
        }
    }
}

impl Drop for EvolutionRunner {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Message stored in the slot for a failed run.
fn failure_message(error: FeedmixError) -> String {
    match error {
        FeedmixError::RunFailure(message) => message,
        other => other.to_string(),
    }
}
