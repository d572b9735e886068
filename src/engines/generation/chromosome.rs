//! Chromosome representation and fitness model for the feed-mix problem.
//!
//! A chromosome is a vector of kilograms, one gene per feed, in the same
//! order as the run's feed table. Cost and nutrient totals are linear in
//! the genes; constraint shortfall is penalized rather than rejected.

use crate::config::GaConfig;
use crate::error::{FeedmixError, Result};
use crate::types::{validate_feeds, FeedItem, Requirement, Totals};
use serde::{Deserialize, Serialize};

pub type Chromosome = Vec<f64>;

/// Penalty per kilogram of PRDD shortfall.
pub const PRDD_PENALTY_WEIGHT: f64 = 1e6;
/// Penalty per kilogram of MP shortfall.
pub const MP_PENALTY_WEIGHT: f64 = 1e6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub cost: f64,
    pub weight: f64,
    pub prdd_total: f64,
    pub mp_total: f64,
    pub penalty: f64,
    pub fitness: f64,
}

impl Evaluation {
    pub fn is_feasible(&self) -> bool {
        self.penalty == 0.0
    }

    pub fn totals(&self) -> Totals {
        Totals {
            cost: self.cost,
            weight: self.weight,
            prdd: self.prdd_total,
            mp: self.mp_total,
        }
    }
}

/// The immutable problem a run optimizes: feed table, requirement and the
/// per-gene search bounds derived from them.
#[derive(Debug, Clone)]
pub struct DietProblem {
    feeds: Vec<FeedItem>,
    requirement: Requirement,
    gene_bounds: Vec<f64>,
    cost_ceiling: f64,
}

impl DietProblem {
    pub fn new(feeds: Vec<FeedItem>, requirement: Requirement, config: &GaConfig) -> Result<Self> {
        validate_feeds(&feeds)?;
        requirement.validate()?;

        let gene_bounds: Vec<f64> = feeds
            .iter()
            .map(|feed| gene_upper_bound(feed, &requirement, config))
            .collect();

        // Largest cost any in-bounds chromosome can reach. Added to the
        // penalty of infeasible mixes so every feasible mix ranks above them.
        let cost_ceiling = feeds
            .iter()
            .zip(&gene_bounds)
            .map(|(feed, bound)| feed.unit_price * bound)
            .sum::<f64>();

        if !cost_ceiling.is_finite() {
            return Err(FeedmixError::InvalidInput(
                "feed prices are too large to evaluate".to_string(),
            ));
        }

        // Denominator of the all-zero chromosome plus the largest cost: the
        // worst fitness any in-bounds mix can get must stay positive.
        let worst_denominator = 1.0
            + 2.0 * cost_ceiling
            + PRDD_PENALTY_WEIGHT * requirement.required_prdd
            + MP_PENALTY_WEIGHT * requirement.required_mp;
        if !worst_denominator.is_finite() || 1.0 / worst_denominator <= 0.0 {
            return Err(FeedmixError::InvalidInput(
                "requirement is too large to evaluate".to_string(),
            ));
        }

        Ok(Self {
            feeds,
            requirement,
            gene_bounds,
            cost_ceiling,
        })
    }

    pub fn feeds(&self) -> &[FeedItem] {
        &self.feeds
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn gene_bounds(&self) -> &[f64] {
        &self.gene_bounds
    }

    pub fn gene_count(&self) -> usize {
        self.feeds.len()
    }

    /// Linear totals of a chromosome against this problem's feed table.
    pub fn totals(&self, chromosome: &[f64]) -> Totals {
        chromosome
            .iter()
            .zip(&self.feeds)
            .fold(Totals::default(), |acc, (&qty, feed)| Totals {
                cost: acc.cost + qty * feed.unit_price,
                weight: acc.weight + qty,
                prdd: acc.prdd + qty * feed.prdd_per_unit,
                mp: acc.mp + qty * feed.mp_per_unit,
            })
    }

    pub fn evaluate(&self, chromosome: &[f64]) -> Evaluation {
        let totals = self.totals(chromosome);

        let deficit_prdd = (self.requirement.required_prdd - totals.prdd).max(0.0);
        let deficit_mp = (self.requirement.required_mp - totals.mp).max(0.0);

        let penalty = if deficit_prdd > 0.0 || deficit_mp > 0.0 {
            self.cost_ceiling + PRDD_PENALTY_WEIGHT * deficit_prdd + MP_PENALTY_WEIGHT * deficit_mp
        } else {
            0.0
        };

        Evaluation {
            cost: totals.cost,
            weight: totals.weight,
            prdd_total: totals.prdd,
            mp_total: totals.mp,
            penalty,
            fitness: 1.0 / (1.0 + totals.cost + penalty),
        }
    }

    /// Clamps every gene into `[0, bound]`; non-finite genes become 0.
    pub fn clamp(&self, chromosome: &mut [f64]) {
        for (gene, &bound) in chromosome.iter_mut().zip(&self.gene_bounds) {
            *gene = if gene.is_finite() { gene.clamp(0.0, bound) } else { 0.0 };
        }
    }
}

/// `factor × max_r(required_r / content_r)` over nutrients the feed contains.
fn gene_upper_bound(feed: &FeedItem, requirement: &Requirement, config: &GaConfig) -> f64 {
    let single_feed_quantity = [
        (requirement.required_prdd, feed.prdd_per_unit),
        (requirement.required_mp, feed.mp_per_unit),
    ]
    .iter()
    .filter(|(_, content)| *content > 0.0)
    .map(|(required, content)| required / content)
    .fold(None, |acc: Option<f64>, q| Some(acc.map_or(q, |a| a.max(q))));

    match single_feed_quantity {
        Some(q) if q.is_finite() => config.gene_bound_factor * q,
        _ => config.fallback_gene_max,
    }
}
