use rand::RngCore;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier of a genome, stable for as long
/// as the genome lives in a population or the archive.
pub type GenomeKey = u64;

/// A behavior descriptor, as produced by the evaluation
/// function. All descriptors in a run must have the same
/// shape for distances between them to be meaningful.
pub type Behavior = Vec<f64>;

/// A population or archive: genomes indexed by key.
///
/// Iteration is in ascending key order, which is the order
/// in which novelty scoring visits genomes.
pub type GenomeMap<G> = BTreeMap<GenomeKey, Genome<G>>;

/// Fitness assigned to genomes whose reward falls
/// below the minimal criterion.
pub const INELIGIBLE_FITNESS: f64 = -1.0;

/// An interface for genome encodings that can be evolved
/// by a [`Population`].
///
/// The encoding is opaque to the novelty engine; only the
/// reference reproduction and speciation collaborators
/// use these operations.
///
/// [`Population`]: crate::Population
pub trait Genotype: Clone {
    type Config;

    /// Returns a randomized genotype.
    fn new(config: &Self::Config, rng: &mut dyn RngCore) -> Self;

    /// Returns the genetic distance between two genotypes.
    fn genetic_distance(first: &Self, second: &Self, config: &Self::Config) -> f64;

    /// Combines two genotypes and returns a (possibly mutated) child.
    /// Asexual reproduction is requested by passing the same parent twice.
    fn mate(parent1: &Self, parent2: &Self, config: &Self::Config, rng: &mut dyn RngCore)
        -> Self;
}

/// A candidate controller together with the results of
/// its evaluation.
///
/// `reward` and `data` are unset until the evaluation
/// function records them, and `fitness` is unset until
/// the novelty pass of the generation has run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome<G> {
    key: GenomeKey,
    genes: G,
    reward: Option<f64>,
    data: Option<Behavior>,
    fitness: Option<f64>,
}

impl<G> Genome<G> {
    /// Creates an unevaluated genome.
    ///
    /// # Examples
    /// ```
    /// use mcns::Genome;
    ///
    /// let genome = Genome::new(7, vec![0.5, -0.5]);
    /// assert_eq!(genome.key(), 7);
    /// assert!(genome.reward().is_none());
    /// assert!(genome.fitness().is_none());
    /// ```
    pub fn new(key: GenomeKey, genes: G) -> Genome<G> {
        Genome {
            key,
            genes,
            reward: None,
            data: None,
            fitness: None,
        }
    }

    pub fn key(&self) -> GenomeKey {
        self.key
    }

    /// Returns the genome's encoding.
    pub fn genes(&self) -> &G {
        &self.genes
    }

    /// Task reward, if the genome has been evaluated.
    pub fn reward(&self) -> Option<f64> {
        self.reward
    }

    /// Behavior descriptor, if the genome has been evaluated.
    pub fn data(&self) -> Option<&[f64]> {
        self.data.as_deref()
    }

    /// Novelty fitness, if the genome has been scored.
    /// This is what reproduction selects on.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Records the outcome of evaluating the genome.
    ///
    /// # Examples
    /// ```
    /// use mcns::Genome;
    ///
    /// let mut genome = Genome::new(0, ());
    /// genome.record_evaluation(0.75, vec![1.0, 2.0]);
    /// assert_eq!(genome.reward(), Some(0.75));
    /// assert_eq!(genome.data(), Some(&[1.0, 2.0][..]));
    /// ```
    pub fn record_evaluation(&mut self, reward: f64, data: Behavior) {
        self.reward = Some(reward);
        self.data = Some(data);
    }

    pub fn set_reward(&mut self, reward: f64) {
        self.reward = Some(reward);
    }

    pub fn set_data(&mut self, data: Behavior) {
        self.data = Some(data);
    }

    pub(crate) fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    /// Unsets reward, data and fitness, so that a genome carried
    /// over to a new generation is evaluated again.
    pub(crate) fn clear_evaluation(&mut self) {
        self.reward = None;
        self.data = None;
        self.fitness = None;
    }
}

impl<G> fmt::Display for Genome<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome {{ key: {}", self.key)?;
        if let Some(reward) = self.reward {
            write!(f, ", reward: {:.4}", reward)?;
        }
        if let Some(fitness) = self.fitness {
            write!(f, ", fitness: {:.4}", fitness)?;
        }
        write!(f, " }}")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_evaluation_unsets_everything() {
        let mut genome = Genome::new(3, ());
        genome.record_evaluation(1.0, vec![0.0]);
        genome.set_fitness(2.0);
        genome.clear_evaluation();
        assert_eq!(genome, Genome::new(3, ()));
    }

    #[test]
    fn display_omits_unset_fields() {
        let mut genome = Genome::new(12, ());
        assert_eq!(genome.to_string(), "Genome { key: 12 }");
        genome.set_reward(0.5);
        genome.set_fitness(-1.0);
        assert_eq!(
            genome.to_string(),
            "Genome { key: 12, reward: 0.5000, fitness: -1.0000 }"
        );
    }
}
