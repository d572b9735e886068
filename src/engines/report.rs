//! Result aggregation: turns a finished run into the report served to clients.

use crate::config::GaConfig;
use crate::engines::generation::{DietProblem, EliteMix, EvolutionOutcome, GenerationRecord};
use crate::types::Totals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slack allowed when checking a total against its requirement.
pub const CONSTRAINT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementReport {
    pub prdd: f64,
    pub mp: f64,
}

/// Whether each nutrient total reaches its requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintStatus {
    pub prdd: bool,
    pub mp: bool,
}

impl ConstraintStatus {
    pub fn all_satisfied(&self) -> bool {
        self.prdd && self.mp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionLine {
    pub name: String,
    pub amount: f64,
    pub weight_percentage: f64,
    pub cost: f64,
    pub cost_percentage: f64,
    pub price: f64,
    pub prdd_contribution: f64,
    pub mp_contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSolution {
    pub rank: usize,
    pub fitness: f64,
    pub totals: Totals,
    pub composition: Vec<CompositionLine>,
}

/// Final result of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub fitness: f64,
    pub totals: Totals,
    pub requirements: RequirementReport,
    pub status: ConstraintStatus,
    pub composition: Vec<CompositionLine>,
    pub history: Vec<GenerationRecord>,
    pub top_solutions: Vec<RankedSolution>,
    pub parameters: GaConfig,
    pub generations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn share(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round_to(part / whole * 100.0, 2)
    } else {
        0.0
    }
}

fn rounded_totals(totals: Totals) -> Totals {
    Totals {
        cost: round_to(totals.cost, 2),
        weight: round_to(totals.weight, 4),
        prdd: round_to(totals.prdd, 4),
        mp: round_to(totals.mp, 4),
    }
}

/// Per-feed breakdown of one chromosome.
pub fn composition(problem: &DietProblem, chromosome: &[f64]) -> Vec<CompositionLine> {
    let totals = problem.totals(chromosome);

    problem
        .feeds()
        .iter()
        .zip(chromosome)
        .map(|(feed, &amount)| {
            let cost = amount * feed.unit_price;
            CompositionLine {
                name: feed.name.clone(),
                amount: round_to(amount, 4),
                weight_percentage: share(amount, totals.weight),
                cost: round_to(cost, 2),
                cost_percentage: share(cost, totals.cost),
                price: feed.unit_price,
                prdd_contribution: round_to(amount * feed.prdd_per_unit, 4),
                mp_contribution: round_to(amount * feed.mp_per_unit, 4),
            }
        })
        .collect()
}

pub fn constraint_status(problem: &DietProblem, totals: &Totals) -> ConstraintStatus {
    let requirement = problem.requirement();
    ConstraintStatus {
        prdd: totals.prdd >= requirement.required_prdd - CONSTRAINT_TOLERANCE,
        mp: totals.mp >= requirement.required_mp - CONSTRAINT_TOLERANCE,
    }
}

fn rank_solutions(problem: &DietProblem, mixes: &[EliteMix]) -> Vec<RankedSolution> {
    mixes
        .iter()
        .enumerate()
        .map(|(i, mix)| RankedSolution {
            rank: i + 1,
            fitness: mix.fitness(),
            totals: rounded_totals(mix.evaluation.totals()),
            composition: composition(problem, &mix.chromosome),
        })
        .collect()
}

fn rounded_record(record: &GenerationRecord) -> GenerationRecord {
    GenerationRecord {
        best_cost: round_to(record.best_cost, 2),
        best_prdd: round_to(record.best_prdd, 4),
        best_mp: round_to(record.best_mp, 4),
        best_composition: record.best_composition.iter().map(|q| round_to(*q, 4)).collect(),
        ..record.clone()
    }
}

/// Builds the report of a finished run.
pub fn build_report(
    problem: &DietProblem,
    parameters: &GaConfig,
    outcome: &EvolutionOutcome,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> RunReport {
    let best = &outcome.best;
    let totals = best.evaluation.totals();
    let requirement = problem.requirement();

    RunReport {
        fitness: best.fitness(),
        totals: rounded_totals(totals),
        requirements: RequirementReport {
            prdd: requirement.required_prdd,
            mp: requirement.required_mp,
        },
        status: constraint_status(problem, &totals),
        composition: composition(problem, &best.chromosome),
        history: outcome.history.iter().map(rounded_record).collect(),
        top_solutions: rank_solutions(problem, &outcome.top_solutions),
        parameters: parameters.clone(),
        generations: outcome.history.len(),
        started_at,
        finished_at,
    }
}
