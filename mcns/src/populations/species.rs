use crate::genome::{Genome, GenomeKey, GenomeMap, Genotype};
use crate::populations::PopulationConfig;

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

/// Species identifier. Specifies
/// the generation in which the species
/// was born, and the count of other species
/// generated in the _same generation_ before
/// the one identified (i.e, if it was the
/// third species born in generation 5, it
/// will be species [5, 2]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesID(pub usize, pub usize);

/// An interface for partitioning a population into species.
///
/// The partition is rebuilt after every reproduction. An
/// empty partition means the population went extinct.
pub trait Speciation<G: Genotype> {
    /// Partitions `population` into species.
    fn speciate(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        population: &GenomeMap<G>,
        generation: usize,
    );

    /// Returns the current species.
    fn species(&self) -> &[Species<G>];

    /// Returns the current species, for reproduction
    /// to record stagnation and remove stagnant species.
    fn species_mut(&mut self) -> &mut Vec<Species<G>>;

    /// Returns whether no species remain.
    fn is_extinct(&self) -> bool {
        self.species().is_empty()
    }
}

/// Species are collections of reproductively
/// compatible (within a certain [compatibility threshold])
/// genomes. Membership is determined by calculating
/// the genetic distance to a _representative_, which is
/// updated on each speciation to the closest genome to
/// the previous representative.
///
/// A species stagnates when its best fitness stops
/// improving, and is removed by reproduction after
/// [`max_stagnation`] generations without improvement.
///
/// [compatibility threshold]: crate::SpeciationConfig::compatibility_threshold
/// [`max_stagnation`]: crate::ReproductionConfig::max_stagnation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species<G> {
    id: SpeciesID,
    representative: Genome<G>,
    pub(super) members: Vec<GenomeKey>,
    created: usize,
    last_improved: usize,
    max_fitness: Option<f64>,
}

impl<G> Species<G> {
    /// Creates a new species with the specified ID and
    /// representative. The representative is also its
    /// only member.
    ///
    /// # Examples
    /// ```
    /// use mcns::{Genome, Species, SpeciesID};
    ///
    /// let species = Species::new(SpeciesID(1, 0), Genome::new(4, ()), 1);
    ///
    /// assert_eq!(species.id(), SpeciesID(1, 0));
    /// assert_eq!(species.members(), &[4]);
    /// assert_eq!(species.time_stagnated(3), 2);
    /// ```
    pub fn new(id: SpeciesID, representative: Genome<G>, generation: usize) -> Species<G> {
        Species {
            id,
            members: vec![representative.key()],
            representative,
            created: generation,
            last_improved: generation,
            max_fitness: None,
        }
    }

    pub fn id(&self) -> SpeciesID {
        self.id
    }

    /// Returns the species' representative.
    pub fn representative(&self) -> &Genome<G> {
        &self.representative
    }

    /// Returns the keys of the species' members.
    pub fn members(&self) -> &[GenomeKey] {
        &self.members
    }

    /// Generation in which the species was born.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Best member fitness the species has reached so far.
    pub fn max_fitness(&self) -> Option<f64> {
        self.max_fitness
    }

    /// Returns the number of generations since the
    /// species' fitness last improved.
    pub fn time_stagnated(&self, generation: usize) -> usize {
        generation.saturating_sub(self.last_improved)
    }

    /// Updates the species' record of maximum
    /// fitness, to keep track of stagnation.
    pub(super) fn update_fitness(&mut self, fitness: f64, generation: usize) {
        if self.max_fitness.map_or(true, |max| fitness > max) {
            self.max_fitness = Some(fitness);
            self.last_improved = generation;
        }
    }
}

/// The default speciation scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesSet<G> {
    species: Vec<Species<G>>,
    births: (usize, usize),
}

impl<G> SpeciesSet<G> {
    /// Returns an empty species set.
    pub fn new() -> SpeciesSet<G> {
        SpeciesSet {
            species: Vec::new(),
            births: (0, 0),
        }
    }

    fn next_id(&mut self, generation: usize) -> SpeciesID {
        if self.births.0 != generation {
            self.births = (generation, 0);
        }
        let id = SpeciesID(generation, self.births.1);
        self.births.1 += 1;
        id
    }
}

impl<G> Default for SpeciesSet<G> {
    fn default() -> Self {
        SpeciesSet::new()
    }
}

impl<G: Genotype> Speciation<G> for SpeciesSet<G> {
    /// Reassigns every genome to a species. Each existing species
    /// first claims the genome closest to its old representative as
    /// its new representative. Remaining genomes then join the
    /// species with the closest representative within the
    /// compatibility threshold, or found a new species.
    /// Species that could not claim a representative die out.
    fn speciate(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        population: &GenomeMap<G>,
        generation: usize,
    ) {
        let threshold = config.speciation.compatibility_threshold;
        let mut unspeciated: BTreeMap<GenomeKey, &Genome<G>> =
            population.iter().map(|(k, g)| (*k, g)).collect();

        let mut species = std::mem::take(&mut self.species);
        species.retain_mut(|s| {
            let closest = unspeciated
                .values()
                .map(|g| (distance(s.representative(), g, genetic_config), *g))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            match closest {
                Some((_, genome)) => {
                    unspeciated.remove(&genome.key());
                    s.representative = genome.clone();
                    s.members = vec![genome.key()];
                    true
                }
                None => false,
            }
        });

        for (key, genome) in unspeciated {
            let compatible = species
                .iter_mut()
                .map(|s| (distance(s.representative(), genome, genetic_config), s))
                .filter(|(d, _)| *d < threshold)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            match compatible {
                Some((_, s)) => s.members.push(key),
                None => {
                    let id = self.next_id(generation);
                    species.push(Species::new(id, genome.clone(), generation));
                }
            }
        }

        species.sort_unstable_by_key(|s| s.id());
        self.species = species;
    }

    fn species(&self) -> &[Species<G>] {
        &self.species
    }

    fn species_mut(&mut self) -> &mut Vec<Species<G>> {
        &mut self.species
    }
}

fn distance<G: Genotype>(a: &Genome<G>, b: &Genome<G>, config: &G::Config) -> f64 {
    G::genetic_distance(a.genes(), b.genes(), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::test_util::Point;

    fn population(points: &[f64]) -> GenomeMap<Point> {
        points
            .iter()
            .enumerate()
            .map(|(i, x)| (i as GenomeKey, Genome::new(i as GenomeKey, Point(vec![*x]))))
            .collect()
    }

    fn config(threshold: f64) -> PopulationConfig {
        let mut config = PopulationConfig::zero();
        config.speciation.compatibility_threshold = threshold;
        config
    }

    fn partition(set: &SpeciesSet<Point>) -> Vec<(SpeciesID, Vec<GenomeKey>)> {
        set.species()
            .iter()
            .map(|s| (s.id(), s.members().to_vec()))
            .collect()
    }

    #[test]
    fn founds_species_by_distance() {
        let mut set = SpeciesSet::new();
        set.speciate(&config(1.0), &1, &population(&[0.0, 0.5, 5.0, 5.2, 0.9]), 0);

        assert_eq!(
            partition(&set),
            vec![
                (SpeciesID(0, 0), vec![0, 1, 4]),
                (SpeciesID(0, 1), vec![2, 3]),
            ]
        );
        assert!(!set.is_extinct());
    }

    #[test]
    fn species_follow_their_representative() {
        let mut set = SpeciesSet::new();
        set.speciate(&config(1.0), &1, &population(&[0.0, 10.0]), 0);

        // The genome closest to each old representative takes over.
        let next: GenomeMap<Point> = [(7, 9.5), (8, 0.2), (9, 20.0)]
            .iter()
            .map(|(k, x)| (*k, Genome::new(*k, Point(vec![*x]))))
            .collect();
        set.speciate(&config(1.0), &1, &next, 1);

        assert_eq!(
            partition(&set),
            vec![
                (SpeciesID(0, 0), vec![8]),
                (SpeciesID(0, 1), vec![7]),
                (SpeciesID(1, 0), vec![9]),
            ]
        );
        assert_eq!(set.species()[1].representative().key(), 7);
    }

    #[test]
    fn species_without_genomes_die_out() {
        let mut set = SpeciesSet::new();
        set.speciate(&config(1.0), &1, &population(&[0.0, 10.0, 20.0]), 0);
        set.speciate(&config(1.0), &1, &population(&[15.0]), 1);
        assert_eq!(set.species().len(), 1);

        set.speciate(&config(1.0), &1, &GenomeMap::new(), 2);
        assert!(set.is_extinct());
    }

    #[test]
    fn accessors_need_no_clone() {
        struct Opaque;
        let species = Species::new(SpeciesID(2, 1), Genome::new(5, Opaque), 2);
        assert_eq!(species.id(), SpeciesID(2, 1));
        assert_eq!(species.members(), &[5]);
        assert_eq!(species.representative().key(), 5);
        assert_eq!(species.time_stagnated(2), 0);
    }

    #[test]
    fn stagnation_tracking() {
        let mut species = Species::new(SpeciesID(0, 0), Genome::new(0, Point(vec![])), 0);
        species.update_fitness(-1.0, 0);
        species.update_fitness(2.0, 3);
        species.update_fitness(2.0, 4);
        species.update_fitness(1.0, 6);
        assert_eq!(species.max_fitness(), Some(2.0));
        assert_eq!(species.time_stagnated(6), 3);
    }
}
