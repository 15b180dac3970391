use super::reproduction::{satisfying, selection_fitness, Constraint};
use super::{EvolutionError, ReproductionConfig, Species};
use crate::genome::{Genome, GenomeKey, GenomeMap, Genotype};

use rand::prelude::{IteratorRandom, Rng};
use rand::rngs::StdRng;

/// Auxiliary type for offspring generation.
/// Handles all the tasks of generating a population's
/// offspring according to the specified configs
/// and allotted offspring.
pub(super) struct OffspringFactory<'a, G: Genotype> {
    species: &'a [Species<G>],
    population: &'a GenomeMap<G>,
    genetic_config: &'a G::Config,
    config: &'a ReproductionConfig,
    constraint: Option<&'a Constraint<G>>,
}

impl<'a, G: Genotype> OffspringFactory<'a, G> {
    pub(super) fn new(
        species: &'a [Species<G>],
        population: &'a GenomeMap<G>,
        genetic_config: &'a G::Config,
        config: &'a ReproductionConfig,
        constraint: Option<&'a Constraint<G>>,
    ) -> OffspringFactory<'a, G> {
        OffspringFactory {
            species,
            population,
            genetic_config,
            config,
            constraint,
        }
    }

    /// Generate the allotted offspring, numbering
    /// new genomes from `next_key` onwards.
    pub(super) fn generate_offspring(
        &self,
        allotted_offspring: &[usize],
        rng: &mut StdRng,
        next_key: &mut GenomeKey,
    ) -> Result<GenomeMap<G>, EvolutionError> {
        let mut offspring = GenomeMap::new();
        for (species_index, allotted) in allotted_offspring.iter().copied().enumerate() {
            if allotted == 0 {
                continue;
            }
            let members = self.members_by_decreasing_fitness(species_index);
            let elite = members.len().min(self.config.elitism).min(allotted);

            self.add_species_elite(&mut offspring, &members[..elite]);
            for _ in elite..allotted {
                let child = self.mate(species_index, &members, rng)?;
                offspring.insert(*next_key, Genome::new(*next_key, child));
                *next_key += 1;
            }
        }
        Ok(offspring)
    }

    /// Returns the species' members sorted by fitness in
    /// descending order. Ties keep key order.
    fn members_by_decreasing_fitness(&self, species_index: usize) -> Vec<&'a Genome<G>> {
        let population = self.population;
        let mut members: Vec<&Genome<G>> = self.species[species_index]
            .members()
            .iter()
            .filter_map(|k| population.get(k))
            .collect();
        members.sort_by_key(|g| g.key());
        members.sort_by(|g1, g2| selection_fitness(g2).total_cmp(&selection_fitness(g1)));
        members
    }

    /// Add the top "elite" members of the species
    /// to the offspring, to be evaluated anew.
    fn add_species_elite(&self, offspring: &mut GenomeMap<G>, elite: &[&Genome<G>]) {
        for genome in elite {
            let mut genome = (*genome).clone();
            genome.clear_evaluation();
            offspring.insert(genome.key(), genome);
        }
    }

    /// Choose parents from the species' top performers, or
    /// the second one from another species, and mate them.
    fn mate(
        &self,
        species_index: usize,
        members: &[&'a Genome<G>],
        rng: &mut StdRng,
    ) -> Result<G, EvolutionError> {
        let survivors = ((members.len() as f64 * self.config.survival_threshold).ceil() as usize)
            .clamp(1, members.len());
        let eligible_parents = &members[..survivors];
        satisfying(self.config.max_constraint_attempts, self.constraint, || {
            let parent1 = pick(eligible_parents, rng);
            let parent2 = self.choose_second_parent(species_index, eligible_parents, rng);
            G::mate(parent1.genes(), parent2.genes(), self.genetic_config, rng)
        })
    }

    /// Choose a parent from the current species' survivors,
    /// or from another randomly selected species.
    fn choose_second_parent(
        &self,
        species_index: usize,
        eligible_parents: &[&'a Genome<G>],
        rng: &mut StdRng,
    ) -> &'a Genome<G> {
        if self.species.len() > 1 && rng.gen::<f64>() < self.config.interspecies_mating_chance {
            let population = self.population;
            let other = self
                .species
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != species_index)
                .flat_map(|(_, s)| s.members().iter().filter_map(move |k| population.get(k)))
                .choose(rng);
            if let Some(other) = other {
                return other;
            }
        }
        pick(eligible_parents, rng)
    }
}

fn pick<'a, G>(parents: &[&'a Genome<G>], rng: &mut StdRng) -> &'a Genome<G> {
    // Species reaching reproduction always have at least one living member.
    parents[rng.gen_range(0..parents.len())]
}
