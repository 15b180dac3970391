use crate::genome::GenomeKey;

use thiserror::Error;

/// A configuration that cannot drive evolution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unexpected fitness criterion {0:?}")]
    UnknownFitnessCriterion(String),
    #[error("metric {0:?} is not implemented")]
    UnknownMetric(String),
    #[error("cannot have no generational limit with no fitness termination")]
    MissingGenerationLimit,
    #[error("invalid novelty threshold {init} with floor {floor}")]
    InvalidNoveltyThreshold { init: f64, floor: f64 },
    #[error("{name} must be a fraction, got {value}")]
    InvalidFraction { name: &'static str, value: f64 },
    #[error("invalid compatibility threshold {0}")]
    InvalidCompatibilityThreshold(f64),
}

/// An error that stops evolution.
#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The evaluation function did not assign a reward.
    #[error("reward not assigned to genome {key}")]
    MissingReward { key: GenomeKey },
    /// The evaluation function did not assign behavior data.
    #[error("behavior data not assigned to genome {key}")]
    MissingBehavior { key: GenomeKey },
    /// Behavior descriptors compared within a generation
    /// have different lengths.
    #[error("behavior data of genome {key} has length {found}, expected {expected}")]
    BehaviorShape {
        key: GenomeKey,
        expected: usize,
        found: usize,
    },
    /// Every species died out and the population
    /// is not configured to reset on extinction.
    #[error("complete extinction in generation {generation}")]
    CompleteExtinction { generation: usize },
    /// No genome satisfying the population's
    /// constraint could be produced.
    #[error("no genome satisfied the constraint after {attempts} attempts")]
    UnsatisfiableConstraint { attempts: usize },
}
