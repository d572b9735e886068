use super::traits::ConfigSection;
use crate::error::FeedmixError;
use serde::{Deserialize, Serialize};

/// Genetic algorithm hyperparameters.
///
/// The four front-end parameters use the wire names `pop_size`, `max_gen`,
/// `crossover_rate` and `mutation_rate`; the rest are server-side tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    #[serde(rename = "pop_size", alias = "population_size")]
    pub population_size: usize,
    #[serde(rename = "max_gen", alias = "max_generations")]
    pub max_generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub selection_method: SelectionMethod,
    pub tournament_size: usize,
    /// Individuals copied unchanged into the next generation (at least one).
    pub elitism_count: usize,
    /// Upper gene bound as a multiple of the quantity that alone meets every
    /// requirement the feed contributes to.
    pub gene_bound_factor: f64,
    /// Upper gene bound for feeds that contain none of the nutrients.
    pub fallback_gene_max: f64,
    /// Mutation noise standard deviation as a fraction of the gene range.
    pub mutation_scale: f64,
    pub parallel: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    Tournament,
    Roulette,
}

pub const MIN_POPULATION_SIZE: usize = 10;
pub const MIN_GENERATIONS: usize = 10;
pub const MAX_POPULATION_SIZE: usize = 10_000;
pub const MAX_GENERATIONS: usize = 100_000;

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 200,
            crossover_rate: 0.3,
            mutation_rate: 0.3,
            selection_method: SelectionMethod::Tournament,
            tournament_size: 3,
            elitism_count: 1,
            gene_bound_factor: 2.0,
            fallback_gene_max: 10.0,
            mutation_scale: 0.1,
            parallel: false,
            seed: None,
        }
    }
}

fn is_rate(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl GaConfig {
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    pub fn with_selection_method(mut self, method: SelectionMethod) -> Self {
        self.selection_method = method;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replaces every out-of-range value with the matching value from
    /// `fallback`. Never fails; returns the names of the replaced fields.
    pub fn normalize(mut self, fallback: &GaConfig) -> (GaConfig, Vec<&'static str>) {
        let mut replaced = Vec::new();

        if !(MIN_POPULATION_SIZE..=MAX_POPULATION_SIZE).contains(&self.population_size) {
            self.population_size = fallback.population_size;
            replaced.push("pop_size");
        }
        if !(MIN_GENERATIONS..=MAX_GENERATIONS).contains(&self.max_generations) {
            self.max_generations = fallback.max_generations;
            replaced.push("max_gen");
        }
        if !is_rate(self.crossover_rate) {
            self.crossover_rate = fallback.crossover_rate;
            replaced.push("crossover_rate");
        }
        if !is_rate(self.mutation_rate) {
            self.mutation_rate = fallback.mutation_rate;
            replaced.push("mutation_rate");
        }
        if self.tournament_size == 0 {
            self.tournament_size = fallback.tournament_size;
            replaced.push("tournament_size");
        }
        if self.elitism_count == 0 || self.elitism_count >= self.population_size {
            self.elitism_count = fallback.elitism_count.clamp(1, self.population_size - 1);
            replaced.push("elitism_count");
        }
        if !is_positive(self.gene_bound_factor) || self.gene_bound_factor < 1.0 {
            self.gene_bound_factor = fallback.gene_bound_factor;
            replaced.push("gene_bound_factor");
        }
        if !is_positive(self.fallback_gene_max) {
            self.fallback_gene_max = fallback.fallback_gene_max;
            replaced.push("fallback_gene_max");
        }
        if !is_positive(self.mutation_scale) || self.mutation_scale > 1.0 {
            self.mutation_scale = fallback.mutation_scale;
            replaced.push("mutation_scale");
        }

        (self, replaced)
    }
}

impl ConfigSection for GaConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), FeedmixError> {
        if !(MIN_POPULATION_SIZE..=MAX_POPULATION_SIZE).contains(&self.population_size) {
            return Err(FeedmixError::Configuration(format!(
                "Population size must be between {} and {}",
                MIN_POPULATION_SIZE, MAX_POPULATION_SIZE
            )));
        }
        if !(MIN_GENERATIONS..=MAX_GENERATIONS).contains(&self.max_generations) {
            return Err(FeedmixError::Configuration(format!(
                "Max generations must be between {} and {}",
                MIN_GENERATIONS, MAX_GENERATIONS
            )));
        }
        if !is_rate(self.mutation_rate) {
            return Err(FeedmixError::Configuration(
                "Mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if !is_rate(self.crossover_rate) {
            return Err(FeedmixError::Configuration(
                "Crossover rate must be between 0 and 1".to_string(),
            ));
        }
        if self.tournament_size == 0 {
            return Err(FeedmixError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        if self.elitism_count == 0 || self.elitism_count >= self.population_size {
            return Err(FeedmixError::Configuration(
                "Elitism count must be between 1 and population size - 1".to_string(),
            ));
        }
        if !is_positive(self.gene_bound_factor) || self.gene_bound_factor < 1.0 {
            return Err(FeedmixError::Configuration(
                "Gene bound factor must be at least 1".to_string(),
            ));
        }
        if !is_positive(self.fallback_gene_max) {
            return Err(FeedmixError::Configuration(
                "Fallback gene max must be positive".to_string(),
            ));
        }
        if !is_positive(self.mutation_scale) || self.mutation_scale > 1.0 {
            return Err(FeedmixError::Configuration(
                "Mutation scale must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = GaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.population_size, 100);
        assert_eq!(config.max_generations, 200);
        assert!((config.crossover_rate - 0.3).abs() < 1e-12);
        assert!((config.mutation_rate - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_replaces_out_of_range_values() {
        let fallback = GaConfig::default();
        let config = GaConfig::default()
            .with_population_size(3)
            .with_max_generations(0)
            .with_crossover_rate(1.5)
            .with_mutation_rate(f64::NAN);

        let (normalized, replaced) = config.normalize(&fallback);

        assert_eq!(normalized.population_size, 100);
        assert_eq!(normalized.max_generations, 200);
        assert!((normalized.crossover_rate - 0.3).abs() < 1e-12);
        assert!((normalized.mutation_rate - 0.3).abs() < 1e-12);
        assert_eq!(replaced, vec!["pop_size", "max_gen", "crossover_rate", "mutation_rate"]);
        assert!(normalized.validate().is_ok());
    }

    #[test]
    fn test_normalize_keeps_valid_values() {
        let config = GaConfig::default()
            .with_population_size(20)
            .with_max_generations(30)
            .with_crossover_rate(0.0)
            .with_mutation_rate(1.0);

        let (normalized, replaced) = config.clone().normalize(&GaConfig::default());

        assert!(replaced.is_empty());
        assert_eq!(normalized, config);
    }

    #[test]
    fn test_normalize_caps_oversized_runs() {
        let fallback = GaConfig::default();
        let config = GaConfig::default()
            .with_population_size(1_000_000_000)
            .with_max_generations(usize::MAX);

        let (normalized, replaced) = config.normalize(&fallback);

        assert_eq!(normalized.population_size, fallback.population_size);
        assert_eq!(normalized.max_generations, fallback.max_generations);
        assert_eq!(replaced, vec!["pop_size", "max_gen"]);

        let at_limit = GaConfig::default()
            .with_population_size(MAX_POPULATION_SIZE)
            .with_max_generations(MAX_GENERATIONS);
        let (normalized, replaced) = at_limit.clone().normalize(&fallback);
        assert!(replaced.is_empty());
        assert_eq!(normalized, at_limit);
    }

    #[test]
    fn test_normalize_elitism_bounded_by_population() {
        let mut config = GaConfig::default().with_population_size(10);
        config.elitism_count = 10;

        let (normalized, replaced) = config.normalize(&GaConfig::default());

        assert_eq!(normalized.elitism_count, 1);
        assert_eq!(replaced, vec!["elitism_count"]);
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        assert!(GaConfig::default().with_mutation_rate(-0.1).validate().is_err());
        assert!(GaConfig::default().with_crossover_rate(2.0).validate().is_err());
        assert!(GaConfig::default().with_population_size(9).validate().is_err());
        assert!(GaConfig::default()
            .with_population_size(MAX_POPULATION_SIZE + 1)
            .validate()
            .is_err());
        assert!(GaConfig::default()
            .with_max_generations(MAX_GENERATIONS + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_wire_names() {
        let config: GaConfig =
            serde_json::from_str(r#"{"pop_size": 20, "max_gen": 30, "selection_method": "roulette"}"#)
                .unwrap();
        assert_eq!(config.population_size, 20);
        assert_eq!(config.max_generations, 30);
        assert_eq!(config.selection_method, SelectionMethod::Roulette);
        // Unspecified fields keep their defaults.
        assert_eq!(config.tournament_size, 3);
    }
}
