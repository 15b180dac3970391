use crate::genome::{Genome, GenomeMap};
use crate::novelty::SearchState;

use serde::{Deserialize, Serialize};

/// Whether a checkpoint captures the state of the novelty search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoveltyPersistence {
    /// Store the archive, threshold, stagnation counter
    /// and best genome, so that a resumed run continues
    /// the same search.
    Include,
    /// Store only the population and its species. A resumed
    /// run starts a new search from the configured threshold.
    Exclude,
}

/// A snapshot of a population between generations,
/// from which evolution can be resumed.
///
/// `S` is the state of the speciation scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<G, S> {
    /// Generation the population is about to evaluate.
    pub generation: usize,
    pub population: GenomeMap<G>,
    pub species: S,
    pub search: Option<SearchState<G>>,
    pub best_genome: Option<Genome<G>>,
}
