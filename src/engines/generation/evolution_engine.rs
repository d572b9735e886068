use crate::config::traits::ConfigSection;
use crate::config::{GaConfig, SelectionMethod};
use crate::engines::generation::{
    chromosome::{Chromosome, DietProblem},
    hall_of_fame::{EliteMix, HallOfFame, TOP_K},
    operators::*,
    population::{Individual, Population},
    progress::GenerationRecord,
};
use crate::error::{FeedmixError, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Failure message of a run stopped through its cancellation token.
pub const CANCELLED_MESSAGE: &str = "run cancelled";

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, record: &GenerationRecord, hall_of_fame_size: usize);
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub best: Individual,
    pub population: Population,
    pub history: Vec<GenerationRecord>,
    pub top_solutions: Vec<EliteMix>,
}

pub struct EvolutionEngine {
    config: GaConfig,
    problem: DietProblem,
    hall_of_fame: HallOfFame,
    rng: StdRng,
    cancel: Option<Arc<AtomicBool>>,
}

impl EvolutionEngine {
    pub fn new(problem: DietProblem, config: GaConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            problem,
            hall_of_fame: HallOfFame::new(TOP_K),
            rng,
            cancel: None,
        })
    }

    /// Checked once per generation; a set flag ends the run with
    /// [`CANCELLED_MESSAGE`].
    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run the evolution process for exactly `max_generations` generations.
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<EvolutionOutcome> {
        let generations = self.config.max_generations;
        self.hall_of_fame.clear();

        let mut chromosomes = self.initialize_population();
        let mut history = Vec::new();

        for generation in 0..generations {
            if self.is_cancelled() {
                return Err(FeedmixError::RunFailure(CANCELLED_MESSAGE.to_string()));
            }

            callback.on_generation_start(generation);

            let population = Population::evaluate(&self.problem, chromosomes, self.config.parallel);
            let record = self.record_generation(generation, &population)?;

            self.hall_of_fame.observe(population.individuals());
            callback.on_generation_complete(&record, self.hall_of_fame.len());
            history.push(record);

            if generation + 1 == generations {
                let best = population
                    .best()
                    .cloned()
                    .ok_or_else(|| FeedmixError::RunFailure("final population is empty".to_string()))?;

                return Ok(EvolutionOutcome {
                    best,
                    population,
                    history,
                    top_solutions: self.hall_of_fame.get_all().to_vec(),
                });
            }

            chromosomes = self.create_next_generation(&population);
        }

        Err(FeedmixError::RunFailure(
            "evolution finished without any generation".to_string(),
        ))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|token| token.load(Ordering::Relaxed))
    }

    fn initialize_population(&mut self) -> Vec<Chromosome> {
        (0..self.config.population_size)
            .map(|_| random_chromosome(&self.problem, &mut self.rng))
            .collect()
    }

    fn record_generation(&self, generation: usize, population: &Population) -> Result<GenerationRecord> {
        let (stats, best) = match (population.stats(), population.best()) {
            (Some(stats), Some(best)) => (stats, best),
            _ => {
                return Err(FeedmixError::RunFailure(format!(
                    "generation {} has an empty population",
                    generation + 1
                )))
            }
        };

        if !(stats.best.is_finite() && stats.average.is_finite() && stats.worst.is_finite()) {
            return Err(FeedmixError::RunFailure(format!(
                "non-finite fitness in generation {}",
                generation + 1
            )));
        }

        Ok(GenerationRecord {
            generation: generation + 1,
            best_fitness: stats.best,
            avg_fitness: stats.average,
            median_fitness: stats.median,
            worst_fitness: stats.worst,
            diversity: stats.diversity,
            best_cost: best.evaluation.cost,
            best_prdd: best.evaluation.prdd_total,
            best_mp: best.evaluation.mp_total,
            best_composition: best.chromosome.clone(),
        })
    }

    fn select<'a>(&mut self, individuals: &'a [Individual]) -> &'a Individual {
        let idx = match self.config.selection_method {
            SelectionMethod::Tournament => {
                tournament_selection(individuals, self.config.tournament_size, &mut self.rng)
            }
            SelectionMethod::Roulette => roulette_selection(individuals, &mut self.rng),
        };
        &individuals[idx]
    }

    fn create_next_generation(&mut self, population: &Population) -> Vec<Chromosome> {
        let size = self.config.population_size;
        let individuals = population.individuals();

        // Elitism: carry the top performers over unchanged
        let mut next_generation: Vec<Chromosome> = population
            .ranking()
            .into_iter()
            .take(self.config.elitism_count.min(size))
            .map(|idx| individuals[idx].chromosome.clone())
            .collect();

        while next_generation.len() < size {
            let parent1 = self.select(individuals);
            let parent2 = self.select(individuals);

            let (mut child1, mut child2) = if self.rng.gen::<f64>() < self.config.crossover_rate {
                blend_crossover(&parent1.chromosome, &parent2.chromosome, &mut self.rng)
            } else {
                (parent1.chromosome.clone(), parent2.chromosome.clone())
            };

            let (rate, scale) = (self.config.mutation_rate, self.config.mutation_scale);
            mutate(&mut child1, &self.problem, rate, scale, &mut self.rng);
            mutate(&mut child2, &self.problem, rate, scale, &mut self.rng);

            next_generation.push(child1);
            if next_generation.len() < size {
                next_generation.push(child2);
            }
        }

        next_generation
    }
}
