use super::chromosome::{Chromosome, DietProblem, Evaluation};
use rayon::prelude::*;
use std::cmp::Ordering;

/// A chromosome together with its cached evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub chromosome: Chromosome,
    pub evaluation: Evaluation,
}

impl Individual {
    pub fn new(problem: &DietProblem, chromosome: Chromosome) -> Self {
        let evaluation = problem.evaluate(&chromosome);
        Self {
            chromosome,
            evaluation,
        }
    }

    pub fn fitness(&self) -> f64 {
        self.evaluation.fitness
    }
}

/// Fitness summary of one population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessStats {
    pub best: f64,
    pub average: f64,
    pub median: f64,
    pub worst: f64,
    /// Coefficient of variation of fitness (`stddev / mean`, 0 when the mean is 0).
    pub diversity: f64,
}

#[derive(Debug, Clone)]
pub struct Population {
    individuals: Vec<Individual>,
}

/// Best first: higher fitness, then lower cost, then earlier index.
fn rank_order(a: (usize, &Individual), b: (usize, &Individual)) -> Ordering {
    b.1.fitness()
        .partial_cmp(&a.1.fitness())
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.1.evaluation
                .cost
                .partial_cmp(&b.1.evaluation.cost)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.0.cmp(&b.0))
}

impl Population {
    /// Evaluates every chromosome, in parallel when requested.
    pub fn evaluate(problem: &DietProblem, chromosomes: Vec<Chromosome>, parallel: bool) -> Self {
        let individuals = if parallel {
            chromosomes
                .into_par_iter()
                .map(|c| Individual::new(problem, c))
                .collect()
        } else {
            chromosomes
                .into_iter()
                .map(|c| Individual::new(problem, c))
                .collect()
        };
        Self { individuals }
    }

    pub fn from_individuals(individuals: Vec<Individual>) -> Self {
        Self { individuals }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    /// Indices ordered best to worst with deterministic tie-breaking.
    pub fn ranking(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.individuals.len()).collect();
        order.sort_by(|&a, &b| rank_order((a, &self.individuals[a]), (b, &self.individuals[b])));
        order
    }

    pub fn best(&self) -> Option<&Individual> {
        self.individuals
            .iter()
            .enumerate()
            .min_by(|&a, &b| rank_order(a, b))
            .map(|(_, ind)| ind)
    }

    pub fn stats(&self) -> Option<FitnessStats> {
        let ranking = self.ranking();
        let (&first, &last) = (ranking.first()?, ranking.last()?);

        let n = self.individuals.len() as f64;
        let average = self.individuals.iter().map(Individual::fitness).sum::<f64>() / n;
        let variance = self
            .individuals
            .iter()
            .map(|ind| (ind.fitness() - average).powi(2))
            .sum::<f64>()
            / n;
        let diversity = if average == 0.0 {
            0.0
        } else {
            variance.sqrt() / average
        };

        Some(FitnessStats {
            best: self.individuals[first].fitness(),
            average,
            median: self.individuals[ranking[ranking.len() / 2]].fitness(),
            worst: self.individuals[last].fitness(),
            diversity,
        })
    }
}
