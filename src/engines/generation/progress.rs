use super::evolution_engine::ProgressCallback;
use serde::{Deserialize, Serialize};

/// Statistics of one generation. One record per generation, append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// 1-based generation index.
    pub generation: usize,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub median_fitness: f64,
    pub worst_fitness: f64,
    pub diversity: f64,
    pub best_cost: f64,
    pub best_prdd: f64,
    pub best_mp: f64,
    pub best_composition: Vec<f64>,
}

/// Progress payload pushed to stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current_gen: usize,
    pub total_gen: usize,
    pub progress_percent: f64,
    pub best_fitness: f64,
}

impl ProgressEvent {
    pub fn from_record(record: &GenerationRecord, total_gen: usize) -> Self {
        let progress_percent = if total_gen == 0 {
            100.0
        } else {
            record.generation as f64 / total_gen as f64 * 100.0
        };
        Self {
            current_gen: record.generation,
            total_gen,
            progress_percent,
            best_fitness: record.best_fitness,
        }
    }
}

/// Writes generation summaries to the log.
pub struct LogProgressCallback {
    total_generations: usize,
}

impl LogProgressCallback {
    pub fn new(total_generations: usize) -> Self {
        Self { total_generations }
    }
}

impl ProgressCallback for LogProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::trace!("Generation {} starting...", generation + 1);
    }

    fn on_generation_complete(&mut self, record: &GenerationRecord, hall_of_fame_size: usize) {
        log::debug!(
            "Generation {}/{} complete. Best fitness: {:.6e}, cost: {:.2}, diversity: {:.4}, Hall of Fame size: {}",
            record.generation,
            self.total_generations,
            record.best_fitness,
            record.best_cost,
            record.diversity,
            hall_of_fame_size
        );
    }
}
