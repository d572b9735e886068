pub mod job_slot;
pub mod evolution_runner;
pub mod orchestrator;

pub use job_slot::{Job, JobSlot, JobState, RunStatus};
pub use evolution_runner::EvolutionRunner;
pub use orchestrator::{Defaults, Orchestrator, RunRequest, RunTicket};
