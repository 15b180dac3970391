//! A Population is a collection of genomes.
//! These are grouped into species, which are
//! evolved by minimal-criterion novelty search:
//! genomes that clear a task reward criterion are
//! selected for the novelty of their behavior.
mod checkpoint;
mod config;
mod errors;
pub mod logging;
mod offspring_factory;
mod reproduction;
mod species;

pub use checkpoint::{Checkpoint, NoveltyPersistence};
pub use config::{
    FitnessCriterion, NoveltyConfig, PopulationConfig, ReproductionConfig, SpeciationConfig,
};
pub use errors::{ConfigError, EvolutionError};
pub use reproduction::{Constraint, DefaultReproduction, Reproduction};
pub use species::{Speciation, Species, SpeciesID, SpeciesSet};

use crate::genome::{Genome, GenomeMap, Genotype};
use crate::novelty::{GenerationScorer, NoveltyArchive};
use logging::{Reporter, ReporterId, ReporterSet};

use log::{debug, info};

/// Stage of a population's evolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// No generation has run yet.
    Initialized,
    /// A generation is underway.
    Running,
    /// The fitness criterion reached the fitness threshold.
    SolutionFound,
    /// The requested number of generations has run.
    GenerationLimitReached,
    /// All species died out.
    Extinct,
}

/// A population of genomes, evolved by minimal-criterion
/// novelty search.
///
/// Reproduction and speciation are delegated to `R` and `S`,
/// which default to [`DefaultReproduction`] and [`SpeciesSet`].
pub struct Population<G: Genotype, R = DefaultReproduction, S = SpeciesSet<G>> {
    population: GenomeMap<G>,
    species: S,
    reproduction: R,
    archive: NoveltyArchive<G>,
    best_genome: Option<Genome<G>>,
    generation: usize,
    status: RunStatus,
    reporters: ReporterSet<G>,
    constraint: Option<Box<Constraint<G>>>,
    config: PopulationConfig,
    genetic_config: G::Config,
}

impl<G: Genotype> Population<G> {
    /// Creates a new population using the passed configurations
    /// and the default reproduction and speciation schemes.
    ///
    /// The type of `genetic_config` depends on the implementation
    /// of [`Genotype`], and is effectively opaque to the population.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    ///
    /// # Examples
    /// ```
    /// # use mcns::Genotype;
    /// # use rand::{Rng, RngCore};
    /// # #[derive(Clone)]
    /// # struct Weights(Vec<f64>);
    /// # impl Genotype for Weights {
    /// #     type Config = usize;
    /// #     fn new(n: &usize, rng: &mut dyn RngCore) -> Self {
    /// #         Weights((0..*n).map(|_| rng.gen_range(-1.0..1.0)).collect())
    /// #     }
    /// #     fn genetic_distance(a: &Self, b: &Self, _: &usize) -> f64 {
    /// #         a.0.iter().zip(&b.0).map(|(x, y)| (x - y).abs()).sum()
    /// #     }
    /// #     fn mate(a: &Self, b: &Self, _: &usize, _: &mut dyn RngCore) -> Self {
    /// #         Weights(a.0.iter().zip(&b.0).map(|(x, y)| (x + y) / 2.0).collect())
    /// #     }
    /// # }
    /// use mcns::{Population, PopulationConfig, RunStatus};
    /// use std::num::NonZeroUsize;
    ///
    /// let mut config = PopulationConfig {
    ///     size: NonZeroUsize::new(20).unwrap(),
    ///     ..PopulationConfig::zero()
    /// };
    /// config.reproduction.survival_threshold = 0.2;
    ///
    /// // With `Weights` a suitable type implementing `Genotype`...
    /// let population = Population::<Weights>::with_defaults(config, 3).unwrap();
    ///
    /// assert_eq!(population.genomes().len(), 20);
    /// assert_eq!(population.status(), RunStatus::Initialized);
    /// ```
    pub fn with_defaults(
        config: PopulationConfig,
        genetic_config: G::Config,
    ) -> Result<Population<G>, EvolutionError> {
        let reproduction = DefaultReproduction::new(&config);
        Population::new(config, genetic_config, reproduction, SpeciesSet::new(), None)
    }
}

impl<G, R, S> Population<G, R, S>
where
    G: Genotype,
    R: Reproduction<G, S>,
    S: Speciation<G>,
{
    /// Creates a new population using the passed configurations
    /// and collaborators. The initial population is created by
    /// `reproduction` and partitioned by `speciation`.
    ///
    /// If a `constraint` is given, every genome ever created
    /// by the population satisfies it.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, or if
    /// the initial population cannot be created.
    pub fn new(
        config: PopulationConfig,
        genetic_config: G::Config,
        mut reproduction: R,
        mut speciation: S,
        constraint: Option<Box<Constraint<G>>>,
    ) -> Result<Population<G, R, S>, EvolutionError> {
        config.validate()?;
        let population = reproduction.create_new(
            &config,
            &genetic_config,
            config.size.get(),
            constraint.as_deref(),
        )?;
        speciation.speciate(&config, &genetic_config, &population, 0);

        Ok(Population {
            population,
            species: speciation,
            reproduction,
            archive: NoveltyArchive::new(
                config.novelty.threshold_init,
                config.novelty.threshold_floor,
            ),
            best_genome: None,
            generation: 0,
            status: RunStatus::Initialized,
            reporters: ReporterSet::new(),
            constraint,
            config,
            genetic_config,
        })
    }

    /// Resumes evolution from a checkpoint.
    ///
    /// The novelty search continues where it left off if the
    /// checkpoint carries its state, and starts afresh otherwise.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn resume(
        checkpoint: Checkpoint<G, S>,
        config: PopulationConfig,
        genetic_config: G::Config,
        mut reproduction: R,
        constraint: Option<Box<Constraint<G>>>,
    ) -> Result<Population<G, R, S>, EvolutionError> {
        config.validate()?;
        let archive = match checkpoint.search {
            Some(state) => NoveltyArchive::restore(state, config.novelty.threshold_floor),
            None => NoveltyArchive::new(
                config.novelty.threshold_init,
                config.novelty.threshold_floor,
            ),
        };

        let max_key = checkpoint
            .population
            .keys()
            .chain(archive.genomes().keys())
            .copied()
            .chain(checkpoint.best_genome.as_ref().map(Genome::key))
            .max();
        if let Some(max_key) = max_key {
            reproduction.resume(max_key);
        }
        info!(
            "Resuming from generation {} with an archive of {} genomes",
            checkpoint.generation,
            archive.len()
        );

        Ok(Population {
            population: checkpoint.population,
            species: checkpoint.species,
            reproduction,
            archive,
            best_genome: checkpoint.best_genome,
            generation: checkpoint.generation,
            status: RunStatus::Initialized,
            reporters: ReporterSet::new(),
            constraint,
            config,
            genetic_config,
        })
    }

    /// Runs up to `n` generations of evolution, or until the
    /// fitness criterion reaches the fitness threshold if `n`
    /// is `None`. Returns the best genome found so far, by reward.
    ///
    /// Each generation, `evaluate` must record a reward and
    /// behavior data on every genome of the population, e.g.
    /// with [`Genome::record_evaluation`]. It also receives the
    /// configuration and the current generation number.
    ///
    /// The generation counter persists across calls, but `n`
    /// counts the generations of this call only.
    ///
    /// # Errors
    /// Returns an error if fitness termination is disabled and
    /// `n` is `None`, if `evaluate` leaves a genome without reward
    /// or needed behavior data, if every species dies out and the
    /// population does not reset on extinction, or if a genome
    /// satisfying the constraint cannot be produced.
    ///
    /// # Examples
    /// ```
    /// # use mcns::Genotype;
    /// # use rand::{Rng, RngCore};
    /// # #[derive(Clone)]
    /// # struct Weights(Vec<f64>);
    /// # impl Genotype for Weights {
    /// #     type Config = usize;
    /// #     fn new(n: &usize, rng: &mut dyn RngCore) -> Self {
    /// #         Weights((0..*n).map(|_| rng.gen_range(-1.0..1.0)).collect())
    /// #     }
    /// #     fn genetic_distance(a: &Self, b: &Self, _: &usize) -> f64 {
    /// #         a.0.iter().zip(&b.0).map(|(x, y)| (x - y).abs()).sum()
    /// #     }
    /// #     fn mate(a: &Self, b: &Self, _: &usize, rng: &mut dyn RngCore) -> Self {
    /// #         let noise = rng.gen_range(-0.1..0.1);
    /// #         Weights(a.0.iter().zip(&b.0).map(|(x, y)| (x + y) / 2.0 + noise).collect())
    /// #     }
    /// # }
    /// use mcns::{Population, PopulationConfig, RunStatus};
    /// use std::num::NonZeroUsize;
    ///
    /// let mut config = PopulationConfig::zero();
    /// config.size = NonZeroUsize::new(10).unwrap();
    /// config.no_fitness_termination = true;
    /// config.novelty.threshold_init = 0.5;
    /// config.novelty.mcns = -1.0;
    /// config.reproduction.survival_threshold = 0.5;
    /// config.reproduction.max_stagnation = NonZeroUsize::new(50).unwrap();
    /// config.speciation.compatibility_threshold = 1.0;
    ///
    /// // With `Weights` a suitable type implementing `Genotype`...
    /// let mut population = Population::<Weights>::with_defaults(config, 2).unwrap();
    ///
    /// let best = population
    ///     .run(
    ///         |genomes, _, _| {
    ///             for genome in genomes.values_mut() {
    ///                 let behavior = genome.genes().0.clone();
    ///                 // Reward genomes for staying close to the origin.
    ///                 let reward = -behavior.iter().map(|x| x.abs()).sum::<f64>();
    ///                 genome.record_evaluation(reward, behavior);
    ///             }
    ///         },
    ///         Some(5),
    ///     )
    ///     .unwrap();
    ///
    /// assert!(best.is_some());
    /// assert_eq!(population.generation(), 5);
    /// assert_eq!(population.status(), RunStatus::GenerationLimitReached);
    /// ```
    pub fn run<E>(
        &mut self,
        mut evaluate: E,
        n: Option<usize>,
    ) -> Result<Option<Genome<G>>, EvolutionError>
    where
        E: FnMut(&mut GenomeMap<G>, &PopulationConfig, usize),
    {
        if self.config.no_fitness_termination && n.is_none() {
            return Err(ConfigError::MissingGenerationLimit.into());
        }

        let mut solved = false;
        let mut iterations = 0;
        while n.map_or(true, |n| iterations < n) {
            iterations += 1;
            self.status = RunStatus::Running;
            self.reporters.start_generation(self.generation);

            evaluate(&mut self.population, &self.config, self.generation);

            let summary = GenerationScorer::new(&mut self.archive, &self.config.novelty)
                .score(&mut self.population)?;
            self.reporters.post_novelty(&summary);

            let best = generation_best(&self.population).cloned();
            if let Some(best) = &best {
                self.reporters
                    .post_evaluate(&self.config, &self.population, self.species.species(), best);
                if self
                    .best_genome
                    .as_ref()
                    .map_or(true, |b| reward(best) > reward(b))
                {
                    self.best_genome = Some(best.clone());
                }
            }

            if !self.config.no_fitness_termination && self.criterion_met() {
                self.status = RunStatus::SolutionFound;
                solved = true;
                if let Some(best) = &best {
                    self.reporters
                        .found_solution(&self.config, self.generation, best);
                }
                break;
            }

            self.population = self.reproduction.reproduce(
                &self.config,
                &self.genetic_config,
                &self.population,
                &mut self.species,
                self.config.size.get(),
                self.generation,
                self.constraint.as_deref(),
            )?;

            if self.species.is_extinct() {
                self.reporters.complete_extinction();
                if !self.config.reset_on_extinction {
                    self.status = RunStatus::Extinct;
                    return Err(EvolutionError::CompleteExtinction {
                        generation: self.generation,
                    });
                }
                self.population = self.reproduction.create_new(
                    &self.config,
                    &self.genetic_config,
                    self.config.size.get(),
                    self.constraint.as_deref(),
                )?;
            }

            self.species.speciate(
                &self.config,
                &self.genetic_config,
                &self.population,
                self.generation,
            );
            self.reporters
                .end_generation(&self.config, &self.population, self.species.species());
            self.generation += 1;
        }

        if !solved {
            self.status = RunStatus::GenerationLimitReached;
            if self.config.no_fitness_termination {
                if let Some(best) = &self.best_genome {
                    self.reporters
                        .found_solution(&self.config, self.generation, best);
                }
            }
        }
        Ok(self.best_genome.clone())
    }

    /// Whether the fitness criterion over the
    /// population's rewards reaches the threshold.
    fn criterion_met(&self) -> bool {
        let value = self
            .config
            .fitness_criterion
            .apply(self.population.values().filter_map(Genome::reward));
        debug!("{} reward: {:?}", self.config.fitness_criterion, value);
        value.map_or(false, |v| v >= self.config.fitness_threshold)
    }

    /// Returns a snapshot of the population from which
    /// evolution can be resumed with [`Population::resume`].
    ///
    /// With [`NoveltyPersistence::Include`], the snapshot
    /// also carries the novelty archive, threshold, stagnation
    /// counter and best genome.
    pub fn checkpoint(&self, persistence: NoveltyPersistence) -> Checkpoint<G, S>
    where
        S: Clone,
    {
        let (search, best_genome) = match persistence {
            NoveltyPersistence::Include => {
                (Some(self.archive.search_state()), self.best_genome.clone())
            }
            NoveltyPersistence::Exclude => (None, None),
        };
        Checkpoint {
            generation: self.generation,
            population: self.population.clone(),
            species: self.species.clone(),
            search,
            best_genome,
        }
    }

    /// Registers a reporter to be notified of the
    /// population's progress. The returned id
    /// can be passed to [`Population::remove_reporter`].
    pub fn add_reporter(&mut self, reporter: impl Reporter<G> + 'static) -> ReporterId
    where
        G: 'static,
    {
        self.reporters.add(reporter)
    }

    /// Unregisters a reporter, returning it if it was registered.
    pub fn remove_reporter(&mut self, id: ReporterId) -> Option<Box<dyn Reporter<G>>> {
        self.reporters.remove(id)
    }

    /// Returns the current genomes, by key.
    pub fn genomes(&self) -> &GenomeMap<G> {
        &self.population
    }

    /// Returns the current species.
    pub fn species(&self) -> &[Species<G>] {
        self.species.species()
    }

    /// Returns the current generation number.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the genome with the highest reward
    /// found so far, if any generation has run.
    pub fn best_genome(&self) -> Option<&Genome<G>> {
        self.best_genome.as_ref()
    }

    /// Returns the novelty archive.
    pub fn archive(&self) -> &NoveltyArchive<G> {
        &self.archive
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }
}

/// Returns the genome with the highest reward,
/// the one with the lowest key on ties.
fn generation_best<G>(population: &GenomeMap<G>) -> Option<&Genome<G>> {
    let mut best: Option<&Genome<G>> = None;
    for genome in population.values() {
        if best.map_or(true, |b| reward(genome) > reward(b)) {
            best = Some(genome);
        }
    }
    best
}

fn reward<G>(genome: &Genome<G>) -> f64 {
    genome.reward().unwrap_or(f64::NEG_INFINITY)
}
