use super::chromosome::{Chromosome, DietProblem};
use super::population::Individual;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Tournament selection: pick best of K random candidates
pub fn tournament_selection<R: Rng>(
    population: &[Individual],
    tournament_size: usize,
    rng: &mut R,
) -> usize {
    let mut best_idx = rng.gen_range(0..population.len());
    let mut best_fitness = population[best_idx].fitness();

    for _ in 1..tournament_size {
        let idx = rng.gen_range(0..population.len());
        if population[idx].fitness() > best_fitness {
            best_idx = idx;
            best_fitness = population[idx].fitness();
        }
    }

    best_idx
}

/// Roulette wheel selection: probability proportional to fitness
pub fn roulette_selection<R: Rng>(population: &[Individual], rng: &mut R) -> usize {
    let total_fitness: f64 = population.iter().map(|ind| ind.fitness().max(0.0)).sum();

    if total_fitness <= 0.0 || !total_fitness.is_finite() {
        return rng.gen_range(0..population.len());
    }

    let mut spin = rng.gen::<f64>() * total_fitness;

    for (idx, ind) in population.iter().enumerate() {
        spin -= ind.fitness().max(0.0);
        if spin <= 0.0 {
            return idx;
        }
    }

    // Fallback
    population.len() - 1
}

/// Arithmetic blend crossover with one `alpha` per pair:
/// `c1 = a + α(b - a)`, `c2 = b + α(a - b)`.
pub fn blend_crossover<R: Rng>(
    parent1: &[f64],
    parent2: &[f64],
    rng: &mut R,
) -> (Chromosome, Chromosome) {
    let alpha: f64 = rng.gen();

    parent1
        .iter()
        .zip(parent2)
        .map(|(&a, &b)| (a + alpha * (b - a), b + alpha * (a - b)))
        .unzip()
}

/// Gaussian mutation: each gene with probability `mutation_rate` gets noise
/// with standard deviation `scale × bound`, then is clamped into `[0, bound]`.
pub fn mutate<R: Rng>(
    chromosome: &mut [f64],
    problem: &DietProblem,
    mutation_rate: f64,
    scale: f64,
    rng: &mut R,
) {
    for (gene, &bound) in chromosome.iter_mut().zip(problem.gene_bounds()) {
        if rng.gen::<f64>() < mutation_rate {
            if let Ok(noise) = Normal::new(0.0, scale * bound) {
                *gene += noise.sample(rng);
            }
        }
    }
    problem.clamp(chromosome);
}

/// Generate random chromosome, uniform within each gene's bounds
pub fn random_chromosome<R: Rng>(problem: &DietProblem, rng: &mut R) -> Chromosome {
    problem
        .gene_bounds()
        .iter()
        .map(|&bound| rng.gen::<f64>() * bound)
        .collect()
}
