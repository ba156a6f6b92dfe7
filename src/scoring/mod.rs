//! Report scoring.
//!
//! Each category has a scoring strategy, a plain function from report text
//! to [`ScoreResult`]. Strategies are looked up through a [`ScoringRegistry`]
//! so the runner never names a concrete heuristic.

pub mod heuristics;

pub use heuristics::*;

use crate::models::{Category, ScoreResult};
use std::collections::HashMap;

/// A pure scoring function for one category.
pub type ScoringStrategy = fn(Option<&str>) -> ScoreResult;

/// Mapping from category to its scoring strategy.
#[derive(Debug, Clone)]
pub struct ScoringRegistry {
    strategies: HashMap<Category, ScoringStrategy>,
}

impl Default for ScoringRegistry {
    fn default() -> Self {
        let mut registry = Self {
            strategies: HashMap::new(),
        };
        registry.register(Category::Quality, score_quality);
        registry.register(Category::Process, score_process);
        registry.register(Category::Maintenance, score_maintenance);
        registry.register(Category::Eco, score_eco);
        registry
    }
}

impl ScoringRegistry {
    /// Register or replace the strategy of a category.
    pub fn register(&mut self, category: Category, strategy: ScoringStrategy) {
        self.strategies.insert(category, strategy);
    }

    /// Score a report with the strategy of its category.
    pub fn score(&self, category: Category, report: Option<&str>) -> ScoreResult {
        match self.strategies.get(&category) {
            Some(strategy) => strategy(report),
            None if category.counts_alerts() => ScoreResult::alerts(None, NO_REPORT),
            None => ScoreResult::score(None, NO_REPORT),
        }
    }
}
