use super::{density, Metric, NoveltyArchive};
use crate::genome::{Genome, GenomeKey, GenomeMap, INELIGIBLE_FITNESS};
use crate::populations::{EvolutionError, NoveltyConfig};

use ahash::AHashMap;
use log::debug;

use std::num::NonZeroUsize;

/// Outcome of a generation's novelty pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoveltySummary {
    /// Genomes that cleared the minimal criterion.
    pub eligible: usize,
    /// Genomes admitted to the archive this generation.
    pub admitted: usize,
    /// Archive size after admission.
    pub archive_size: usize,
    /// Admission threshold after adaptation.
    pub threshold: f64,
    /// Consecutive generations without admissions.
    pub stagnation: usize,
}

/// Assigns novelty fitness to every genome of a population,
/// and updates the novelty archive accordingly.
///
/// Genomes are visited in ascending key order. A genome staged
/// for admission counts as an archived neighbor for every genome
/// visited after it, so the visiting order is part of the result.
pub struct GenerationScorer<'a, G> {
    archive: &'a mut NoveltyArchive<G>,
    config: &'a NoveltyConfig,
}

impl<'a, G: Clone> GenerationScorer<'a, G> {
    pub fn new(archive: &'a mut NoveltyArchive<G>, config: &'a NoveltyConfig) -> Self {
        GenerationScorer { archive, config }
    }

    /// Scores the population.
    ///
    /// Genomes whose reward is below the minimal criterion get a
    /// fitness of [`INELIGIBLE_FITNESS`]. Every other genome gets
    /// the k-nearest-neighbor density of its distances to the rest
    /// of the population and to the archive, with `k` the configured
    /// number of neighbors. Its density with respect to the archive
    /// alone (`k = 1`) decides whether it is staged for admission.
    ///
    /// # Errors
    /// Returns an error, without modifying the population or the
    /// archive, if any genome has no reward, or if a genome that
    /// takes part in a comparison has no behavior data or behavior
    /// data of a different length than the others.
    pub fn score(
        &mut self,
        population: &mut GenomeMap<G>,
    ) -> Result<NoveltySummary, EvolutionError> {
        self.check_evaluations(population)?;

        let metric = self.config.metric;
        let mut fitnesses: Vec<(GenomeKey, f64)> = Vec::with_capacity(population.len());
        let mut eligible = 0;
        for (&key, genome) in population.iter() {
            let reward = genome
                .reward()
                .ok_or(EvolutionError::MissingReward { key })?;
            if reward < self.config.mcns {
                fitnesses.push((key, INELIGIBLE_FITNESS));
                continue;
            }
            eligible += 1;

            let behavior = behavior_of(genome)?;
            let mut archived = distances(metric, key, behavior, self.archive.genomes())?;
            archived.extend(distances(metric, key, behavior, self.archive.staged())?);
            let archive_density = density(archived.values().copied().collect(), NonZeroUsize::MIN);
            self.archive.admit_candidate(genome, archive_density);

            let mut neighbors = distances(metric, key, behavior, population)?;
            neighbors.extend(archived);
            let fitness = density(neighbors.values().copied().collect(), self.config.neighbors);
            fitnesses.push((key, fitness));
        }

        for (key, fitness) in fitnesses {
            if let Some(genome) = population.get_mut(&key) {
                genome.set_fitness(fitness);
            }
        }

        let admitted = self.archive.commit();
        self.archive.adapt_threshold(admitted);
        debug!(
            "novelty pass: {}/{} eligible, {} admitted, archive size {}",
            eligible,
            population.len(),
            admitted,
            self.archive.len()
        );

        Ok(NoveltySummary {
            eligible,
            admitted,
            archive_size: self.archive.len(),
            threshold: self.archive.threshold(),
            stagnation: self.archive.stagnation(),
        })
    }

    /// Makes sure the pass can run to completion: every genome
    /// must have a reward, and if any genome is eligible every
    /// genome is compared against, so every genome needs data.
    fn check_evaluations(&self, population: &GenomeMap<G>) -> Result<(), EvolutionError> {
        let mut any_eligible = false;
        for genome in population.values() {
            match genome.reward() {
                None => return Err(EvolutionError::MissingReward { key: genome.key() }),
                Some(reward) => any_eligible |= reward >= self.config.mcns,
            }
        }
        if !any_eligible {
            return Ok(());
        }
        let mut expected = None;
        for genome in population.values().chain(self.archive.genomes().values()) {
            let found = behavior_of(genome)?.len();
            match expected {
                None => expected = Some(found),
                Some(expected) if expected != found => {
                    return Err(EvolutionError::BehaviorShape {
                        key: genome.key(),
                        expected,
                        found,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

fn behavior_of<G>(genome: &Genome<G>) -> Result<&[f64], EvolutionError> {
    genome
        .data()
        .ok_or(EvolutionError::MissingBehavior { key: genome.key() })
}

/// Distances from `behavior` to every genome in `genomes`,
/// indexed by key, skipping the genome with key `key`.
fn distances<G>(
    metric: Metric,
    key: GenomeKey,
    behavior: &[f64],
    genomes: &GenomeMap<G>,
) -> Result<AHashMap<GenomeKey, f64>, EvolutionError> {
    let mut distances = AHashMap::with_capacity(genomes.len());
    for (&other_key, other) in genomes {
        if other_key == key {
            continue;
        }
        distances.insert(other_key, metric.distance(behavior, behavior_of(other)?));
    }
    Ok(distances)
}
