use super::chromosome::{Chromosome, Evaluation};
use super::population::Individual;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Number of distinct solutions kept across a run.
pub const TOP_K: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct EliteMix {
    pub chromosome: Chromosome,
    pub evaluation: Evaluation,
    pub signature: String, // For deduplication
}

impl EliteMix {
    pub fn from_individual(individual: &Individual) -> Self {
        Self {
            signature: composition_signature(&individual.chromosome),
            chromosome: individual.chromosome.clone(),
            evaluation: individual.evaluation,
        }
    }

    pub fn fitness(&self) -> f64 {
        self.evaluation.fitness
    }
}

/// Canonical key of a composition: every quantity rounded to 2 decimals.
pub fn composition_signature(chromosome: &[f64]) -> String {
    chromosome
        .iter()
        .map(|q| {
            let rounded = (q * 100.0).round() / 100.0;
            // -0.00 and 0.00 must collide
            format!("{:.2}", rounded + 0.0)
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub struct HallOfFame {
    mixes: Vec<EliteMix>,
    max_size: usize,
    seen_signatures: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            mixes: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a mix. A duplicate composition only replaces the
    /// stored one when it is strictly fitter.
    pub fn try_add(&mut self, mix: EliteMix) -> bool {
        if self.max_size == 0 {
            return false;
        }

        if self.seen_signatures.contains(&mix.signature) {
            let Some(existing) = self.mixes.iter_mut().find(|m| m.signature == mix.signature) else {
                return false;
            };
            if mix.fitness() <= existing.fitness() {
                return false;
            }
            *existing = mix;
            self.sort();
            return true;
        }

        if self.mixes.len() >= self.max_size {
            let admits = self
                .mixes
                .last()
                .is_some_and(|worst| compare_mixes(&mix, worst) == Ordering::Less);
            if !admits {
                return false;
            }
        }

        self.seen_signatures.insert(mix.signature.clone());
        self.mixes.push(mix);
        self.sort_and_trim();
        true
    }

    /// Offers every individual of a population.
    pub fn observe(&mut self, individuals: &[Individual]) {
        for individual in individuals {
            self.try_add(EliteMix::from_individual(individual));
        }
    }

    fn sort(&mut self) {
        self.mixes.sort_by(compare_mixes);
    }

    fn sort_and_trim(&mut self) {
        self.sort();
        while self.mixes.len() > self.max_size {
            if let Some(removed) = self.mixes.pop() {
                self.seen_signatures.remove(&removed.signature);
            }
        }
    }

    /// All kept mixes, best first.
    pub fn get_all(&self) -> &[EliteMix] {
        &self.mixes
    }

    pub fn len(&self) -> usize {
        self.mixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixes.is_empty()
    }

    pub fn clear(&mut self) {
        self.mixes.clear();
        self.seen_signatures.clear();
    }
}

/// Higher fitness first, cheaper first on ties.
fn compare_mixes(a: &EliteMix, b: &EliteMix) -> Ordering {
    b.fitness()
        .partial_cmp(&a.fitness())
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.evaluation
                .cost
                .partial_cmp(&b.evaluation.cost)
                .unwrap_or(Ordering::Equal)
        })
}
