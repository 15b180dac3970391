use super::offspring_factory::OffspringFactory;
use super::{EvolutionError, PopulationConfig, Speciation, Species};
use crate::genome::{Genome, GenomeKey, GenomeMap, Genotype, INELIGIBLE_FITNESS};

use ahash::AHashSet;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use std::num::NonZeroUsize;

/// A predicate every genome of the population must satisfy,
/// e.g. structural validity of the controller it encodes.
pub type Constraint<G> = dyn Fn(&G) -> bool;

/// An interface for creating populations and breeding
/// new generations from a speciated population.
///
/// Selection should be driven by genome [fitness],
/// not by reward.
///
/// [fitness]: crate::Genome::fitness
pub trait Reproduction<G: Genotype, S: Speciation<G>> {
    /// Creates a random population of `pop_size` genomes.
    fn create_new(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        pop_size: usize,
        constraint: Option<&Constraint<G>>,
    ) -> Result<GenomeMap<G>, EvolutionError>;

    /// Creates the next generation from the current population
    /// and its species. Species that are not to reproduce any
    /// further are removed from `species`; if none remain, the
    /// returned population is meaningless and the population
    /// is considered extinct.
    #[allow(clippy::too_many_arguments)]
    fn reproduce(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        population: &GenomeMap<G>,
        species: &mut S,
        pop_size: usize,
        generation: usize,
        constraint: Option<&Constraint<G>>,
    ) -> Result<GenomeMap<G>, EvolutionError>;

    /// Informs the reproduction scheme that evolution resumes
    /// from a state whose greatest genome key is `max_key`.
    fn resume(&mut self, _max_key: GenomeKey) {}
}

/// The default reproduction scheme.
///
/// Species stagnating for too long are removed, except for
/// the best [`species_elitism`] ones. The remaining species
/// receive offspring in proportion to the mean normalized
/// fitness of their members; each keeps its [elite] and mates
/// its [top performers], with a [chance] of taking the second
/// parent from another species.
///
/// [`species_elitism`]: crate::ReproductionConfig::species_elitism
/// [elite]: crate::ReproductionConfig::elitism
/// [top performers]: crate::ReproductionConfig::survival_threshold
/// [chance]: crate::ReproductionConfig::interspecies_mating_chance
#[derive(Debug, Clone)]
pub struct DefaultReproduction {
    rng: StdRng,
    next_key: GenomeKey,
}

impl DefaultReproduction {
    /// Creates a reproduction scheme seeded from
    /// [`ReproductionConfig::seed`], or randomly if unset.
    ///
    /// [`ReproductionConfig::seed`]: crate::ReproductionConfig::seed
    pub fn new(config: &PopulationConfig) -> DefaultReproduction {
        DefaultReproduction {
            rng: match config.reproduction.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            next_key: 0,
        }
    }

    fn next_key(&mut self) -> GenomeKey {
        let key = self.next_key;
        self.next_key += 1;
        key
    }
}

impl<G, S> Reproduction<G, S> for DefaultReproduction
where
    G: Genotype,
    S: Speciation<G>,
{
    fn create_new(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        pop_size: usize,
        constraint: Option<&Constraint<G>>,
    ) -> Result<GenomeMap<G>, EvolutionError> {
        let attempts = config.reproduction.max_constraint_attempts;
        let mut population = GenomeMap::new();
        for _ in 0..pop_size {
            let genes = satisfying(attempts, constraint, || G::new(genetic_config, &mut self.rng))?;
            let key = self.next_key();
            population.insert(key, Genome::new(key, genes));
        }
        Ok(population)
    }

    fn reproduce(
        &mut self,
        config: &PopulationConfig,
        genetic_config: &G::Config,
        population: &GenomeMap<G>,
        species: &mut S,
        pop_size: usize,
        generation: usize,
        constraint: Option<&Constraint<G>>,
    ) -> Result<GenomeMap<G>, EvolutionError> {
        let species = species.species_mut();
        remove_stagnant_species(species, population, config, generation);
        species.retain(|s| s.members().iter().any(|k| population.contains_key(k)));
        if species.is_empty() {
            return Ok(GenomeMap::new());
        }

        let allotted_offspring = round_retain_sum(&allot_offspring(species, population, pop_size));
        debug!("offspring allotted to {} species: {:?}", species.len(), allotted_offspring);

        OffspringFactory::new(
            species.as_slice(),
            population,
            genetic_config,
            &config.reproduction,
            constraint,
        )
        .generate_offspring(&allotted_offspring, &mut self.rng, &mut self.next_key)
    }

    fn resume(&mut self, max_key: GenomeKey) {
        self.next_key = self.next_key.max(max_key + 1);
    }
}

/// Returns the first genome produced by `make` that satisfies
/// `constraint`, trying at most `attempts` times.
pub(super) fn satisfying<G>(
    attempts: NonZeroUsize,
    constraint: Option<&Constraint<G>>,
    mut make: impl FnMut() -> G,
) -> Result<G, EvolutionError> {
    for _ in 0..attempts.get() {
        let genes = make();
        if constraint.map_or(true, |satisfied| satisfied(&genes)) {
            return Ok(genes);
        }
    }
    Err(EvolutionError::UnsatisfiableConstraint {
        attempts: attempts.get(),
    })
}

/// Fitness of a genome for selection purposes.
/// Unscored genomes are treated as ineligible.
pub(super) fn selection_fitness<G>(genome: &Genome<G>) -> f64 {
    genome.fitness().unwrap_or(INELIGIBLE_FITNESS)
}

/// Records each species' best fitness, and removes those that
/// have not improved for too long, sparing the best
/// `species_elitism` species.
fn remove_stagnant_species<G: Clone>(
    species: &mut Vec<Species<G>>,
    population: &GenomeMap<G>,
    config: &PopulationConfig,
    generation: usize,
) {
    let mut ranked: Vec<(f64, usize)> = Vec::with_capacity(species.len());
    for (i, s) in species.iter_mut().enumerate() {
        let best = s
            .members()
            .iter()
            .filter_map(|k| population.get(k))
            .map(selection_fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        s.update_fitness(best, generation);
        ranked.push((best, i));
    }
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    let protected: AHashSet<_> = ranked
        .iter()
        .take(config.reproduction.species_elitism)
        .map(|(_, i)| species[*i].id())
        .collect();

    let max_stagnation = config.reproduction.max_stagnation.get();
    species.retain(|s| {
        let keep = protected.contains(&s.id()) || s.time_stagnated(generation) < max_stagnation;
        if !keep {
            debug!("species {:?} removed after stagnating", s.id());
        }
        keep
    });
}

/// Returns the (fractional) number of offspring each species
/// should receive, adding up to `pop_size`.
///
/// Member fitnesses are normalized to the population's fitness
/// range (at least 1 wide), and each species' share is
/// proportional to the mean normalized fitness of its members.
/// Non-finite fitnesses count as the largest finite fitness.
fn allot_offspring<G: Clone>(
    species: &[Species<G>],
    population: &GenomeMap<G>,
    pop_size: usize,
) -> Vec<f64> {
    let member_fitness = |s: &Species<G>| -> Vec<f64> {
        s.members()
            .iter()
            .filter_map(|k| population.get(k))
            .map(selection_fitness)
            .collect()
    };
    let fitnesses: Vec<Vec<f64>> = species.iter().map(member_fitness).collect();

    let finite_max = fitnesses
        .iter()
        .flatten()
        .copied()
        .filter(|f| f.is_finite())
        .fold(None, |max: Option<f64>, f| Some(max.map_or(f, |m| m.max(f))))
        .unwrap_or(0.0);
    let sanitize = |f: f64| if f.is_finite() { f } else { finite_max };
    let (min, max) = fitnesses
        .iter()
        .flatten()
        .map(|f| sanitize(*f))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| (lo.min(f), hi.max(f)));
    let range = (max - min).max(1.0);

    let adjusted: Vec<f64> = fitnesses
        .iter()
        .map(|members| {
            members.iter().map(|f| (sanitize(*f) - min) / range).sum::<f64>() / members.len() as f64
        })
        .collect();
    let adjusted_sum: f64 = adjusted.iter().sum();
    if adjusted_sum > 0.0 {
        adjusted
            .iter()
            .map(|a| a / adjusted_sum * pop_size as f64)
            .collect()
    } else {
        vec![pop_size as f64 / species.len() as f64; species.len()]
    }
}

/// Rounds all values to positive whole numbers
/// while preserving their order and sum, assuming it is also whole.
/// Rounding is done in the manner that minimizes
/// the average error to the original set of values.
fn round_retain_sum(values: &[f64]) -> Vec<usize> {
    let total_sum = values.iter().sum::<f64>().round() as usize;
    let mut truncated: Vec<(usize, usize, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let u = f.floor();
            let e = f - u;
            (i, u as usize, e)
        })
        .collect();
    let truncated_sum: usize = truncated.iter().map(|(_, u, _)| *u).sum();
    let remainder = total_sum.saturating_sub(truncated_sum).min(truncated.len());
    // Sort in decreasing order of error
    truncated.sort_by(|a, b| b.2.total_cmp(&a.2));
    for (_, u, _) in &mut truncated[..remainder] {
        *u += 1;
    }
    truncated.sort_by_key(|(i, ..)| *i);
    truncated.iter().map(|(_, u, _)| *u).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::test_util::{evaluated, Point};
    use crate::populations::SpeciesSet;

    fn config() -> PopulationConfig {
        let mut config = PopulationConfig::zero();
        config.reproduction.elitism = 1;
        config.reproduction.survival_threshold = 0.5;
        config.reproduction.max_stagnation = NonZeroUsize::new(3).unwrap();
        config.reproduction.max_constraint_attempts = NonZeroUsize::new(50).unwrap();
        config.reproduction.seed = Some(7);
        config.speciation.compatibility_threshold = 1.0;
        config
    }

    fn scored(points: &[(f64, f64)]) -> GenomeMap<Point> {
        points
            .iter()
            .enumerate()
            .map(|(i, (x, fitness))| {
                let mut genome = evaluated(i as GenomeKey, 1.0, &[*x]);
                genome.set_fitness(*fitness);
                (i as GenomeKey, genome)
            })
            .collect()
    }

    #[test]
    fn round_retain_sum() {
        let v = [
            5.2,
            9.5,
            2.8,
            1.3,
            2.2,
            2.7,
            6.3,
            1.0000000000001,
            0.9999999999999,
        ];
        let w = super::round_retain_sum(&v);
        assert_eq!(v.iter().sum::<f64>().round() as usize, w.iter().sum::<usize>());
        assert_eq!(w, [5, 10, 3, 1, 2, 3, 6, 1, 1]);
    }

    #[test]
    fn create_new_assigns_unique_keys() {
        let config = config();
        let mut reproduction = DefaultReproduction::new(&config);
        let population = Reproduction::<Point, SpeciesSet<Point>>::create_new(
            &mut reproduction,
            &config,
            &2,
            10,
            None,
        )
        .unwrap();
        assert_eq!(population.keys().copied().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
        assert!(population.values().all(|g| g.genes().0.len() == 2 && g.reward().is_none()));
    }

    #[test]
    fn create_new_respects_constraint() {
        let config = config();
        let mut reproduction = DefaultReproduction::new(&config);
        let positive = |p: &Point| p.0[0] > 0.0;
        let population = Reproduction::<Point, SpeciesSet<Point>>::create_new(
            &mut reproduction,
            &config,
            &1,
            20,
            Some(&positive),
        )
        .unwrap();
        assert!(population.values().all(|g| g.genes().0[0] > 0.0));

        let impossible = |_: &Point| false;
        let result = Reproduction::<Point, SpeciesSet<Point>>::create_new(
            &mut reproduction,
            &config,
            &1,
            1,
            Some(&impossible),
        );
        assert!(matches!(
            result,
            Err(EvolutionError::UnsatisfiableConstraint { attempts: 50 })
        ));
    }

    #[test]
    fn reproduce_keeps_size_and_elites() {
        let config = config();
        let population = scored(&[(0.0, 1.0), (0.1, 3.0), (5.0, 2.0), (5.1, -1.0)]);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &1, &population, 0);
        let mut reproduction = DefaultReproduction::new(&config);
        Reproduction::<Point, SpeciesSet<Point>>::resume(&mut reproduction, 3);

        let next = reproduction
            .reproduce(&config, &1, &population, &mut species, 4, 0, None)
            .unwrap();

        assert_eq!(next.len(), 4);
        // The best member of each species survives unevaluated,
        // children get fresh keys.
        assert!(next.contains_key(&1));
        assert!(next.contains_key(&2));
        assert!(next.keys().filter(|k| **k > 3).count() == 2);
        assert!(next.values().all(|g| g.fitness().is_none()));
    }

    #[test]
    fn stagnant_species_are_removed() {
        let mut config = config();
        config.reproduction.species_elitism = 1;
        let population = scored(&[(0.0, 1.0), (5.0, 2.0)]);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &1, &population, 0);
        let mut reproduction = DefaultReproduction::new(&config);

        for generation in 0..3 {
            reproduction
                .reproduce(&config, &1, &population, &mut species, 2, generation, None)
                .unwrap();
            assert_eq!(species.species().len(), 2);
        }
        // Neither species improved since generation 0; only
        // the fitter one is spared.
        reproduction
            .reproduce(&config, &1, &population, &mut species, 2, 3, None)
            .unwrap();
        assert_eq!(species.species().len(), 1);
        assert_eq!(species.species()[0].members(), &[1]);

        config.reproduction.species_elitism = 0;
        reproduction
            .reproduce(&config, &1, &population, &mut species, 2, 4, None)
            .unwrap();
        assert!(species.is_extinct());
    }

    #[test]
    fn allotment_with_unbounded_fitness() {
        let config = config();
        let population = scored(&[(0.0, f64::INFINITY), (5.0, 0.5), (10.0, -1.0)]);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &1, &population, 0);

        let allotted = allot_offspring(species.species(), &population, 10);
        assert!(allotted.iter().all(|a| a.is_finite()));
        assert!((allotted.iter().sum::<f64>() - 10.0).abs() < 1e-9);
        // The infinitely novel genome counts as the best finite one.
        assert_eq!(allotted[0], allotted[1]);
        assert_eq!(allotted[2], 0.0);
    }

    #[test]
    fn allotment_without_spread_is_even() {
        let population = scored(&[(0.0, -1.0), (5.0, -1.0)]);
        let mut species = SpeciesSet::new();
        species.speciate(&config(), &1, &population, 0);
        assert_eq!(allot_offspring(species.species(), &population, 6), vec![3.0, 3.0]);
    }
}
