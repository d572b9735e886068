pub mod chromosome;
pub mod population;
pub mod operators;
pub mod hall_of_fame;
pub mod evolution_engine;
pub mod progress;

pub use chromosome::{Chromosome, DietProblem, Evaluation};
pub use population::{FitnessStats, Individual, Population};
pub use hall_of_fame::{EliteMix, HallOfFame, TOP_K};
pub use evolution_engine::{EvolutionEngine, EvolutionOutcome, ProgressCallback, CANCELLED_MESSAGE};
pub use progress::{GenerationRecord, LogProgressCallback, ProgressEvent};
