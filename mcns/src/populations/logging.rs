//! Observers of evolution.
//!
//! A [`Population`] notifies every registered [`Reporter`] at
//! fixed points of each generation. Reporters are purely
//! observational: they cannot alter the course of evolution.
//!
//! [`Population`]: crate::Population
use super::{PopulationConfig, Species, SpeciesID};
use crate::genome::{Genome, GenomeMap, INELIGIBLE_FITNESS};
use crate::novelty::NoveltySummary;

use log::{debug, info, warn};

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Receives notifications from a population during evolution.
/// All notifications do nothing by default.
#[allow(unused_variables)]
pub trait Reporter<G> {
    /// A generation is about to be evaluated.
    fn start_generation(&mut self, generation: usize) {}

    /// The novelty pass of the generation has run.
    fn post_novelty(&mut self, summary: &NoveltySummary) {}

    /// The generation has been evaluated and scored.
    /// `best` is the genome with the highest reward.
    fn post_evaluate(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
        best: &Genome<G>,
    ) {
    }

    /// Every species went extinct.
    fn complete_extinction(&mut self) {}

    /// The next generation has been bred and speciated.
    fn end_generation(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
    ) {
    }

    /// Evolution is over. `best` is the best genome found.
    fn found_solution(&mut self, config: &PopulationConfig, generation: usize, best: &Genome<G>) {}
}

/// Shared reporters, so that their owner can inspect
/// them while the population holds a handle.
impl<G, R: Reporter<G>> Reporter<G> for Arc<Mutex<R>> {
    fn start_generation(&mut self, generation: usize) {
        if let Ok(mut reporter) = self.lock() {
            reporter.start_generation(generation);
        }
    }

    fn post_novelty(&mut self, summary: &NoveltySummary) {
        if let Ok(mut reporter) = self.lock() {
            reporter.post_novelty(summary);
        }
    }

    fn post_evaluate(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
        best: &Genome<G>,
    ) {
        if let Ok(mut reporter) = self.lock() {
            reporter.post_evaluate(config, population, species, best);
        }
    }

    fn complete_extinction(&mut self) {
        if let Ok(mut reporter) = self.lock() {
            reporter.complete_extinction();
        }
    }

    fn end_generation(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
    ) {
        if let Ok(mut reporter) = self.lock() {
            reporter.end_generation(config, population, species);
        }
    }

    fn found_solution(&mut self, config: &PopulationConfig, generation: usize, best: &Genome<G>) {
        if let Ok(mut reporter) = self.lock() {
            reporter.found_solution(config, generation, best);
        }
    }
}

/// Identifies a reporter within a [`ReporterSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReporterId(usize);

/// A collection of reporters, notified in insertion order.
/// An empty set is valid and reports nothing.
pub struct ReporterSet<G> {
    reporters: Vec<(ReporterId, Box<dyn Reporter<G>>)>,
    next_id: usize,
}

impl<G> ReporterSet<G> {
    pub fn new() -> ReporterSet<G> {
        ReporterSet {
            reporters: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a reporter after every current one. Ids are never reused.
    pub fn add(&mut self, reporter: impl Reporter<G> + 'static) -> ReporterId {
        let id = ReporterId(self.next_id);
        self.next_id += 1;
        self.reporters.push((id, Box::new(reporter)));
        id
    }

    /// Removes the reporter with the given id, if present,
    /// keeping the others in order.
    pub fn remove(&mut self, id: ReporterId) -> Option<Box<dyn Reporter<G>>> {
        let index = self.reporters.iter().position(|(i, _)| *i == id)?;
        Some(self.reporters.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl<G> Default for ReporterSet<G> {
    fn default() -> Self {
        ReporterSet::new()
    }
}

impl<G> Reporter<G> for ReporterSet<G> {
    fn start_generation(&mut self, generation: usize) {
        for (_, r) in &mut self.reporters {
            r.start_generation(generation);
        }
    }

    fn post_novelty(&mut self, summary: &NoveltySummary) {
        for (_, r) in &mut self.reporters {
            r.post_novelty(summary);
        }
    }

    fn post_evaluate(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
        best: &Genome<G>,
    ) {
        for (_, r) in &mut self.reporters {
            r.post_evaluate(config, population, species, best);
        }
    }

    fn complete_extinction(&mut self) {
        for (_, r) in &mut self.reporters {
            r.complete_extinction();
        }
    }

    fn end_generation(
        &mut self,
        config: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
    ) {
        for (_, r) in &mut self.reporters {
            r.end_generation(config, population, species);
        }
    }

    fn found_solution(&mut self, config: &PopulationConfig, generation: usize, best: &Genome<G>) {
        for (_, r) in &mut self.reporters {
            r.found_solution(config, generation, best);
        }
    }
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter {
    generation: usize,
    started: Option<Instant>,
}

impl LogReporter {
    pub fn new() -> LogReporter {
        LogReporter::default()
    }
}

impl<G> Reporter<G> for LogReporter {
    fn start_generation(&mut self, generation: usize) {
        self.generation = generation;
        self.started = Some(Instant::now());
        info!("****** Running generation {} ******", generation);
    }

    fn post_novelty(&mut self, summary: &NoveltySummary) {
        info!(
            "Novelty archive: {} genomes ({} new), threshold {:.5}, {} eligible",
            summary.archive_size, summary.admitted, summary.threshold, summary.eligible
        );
    }

    fn post_evaluate(
        &mut self,
        _: &PopulationConfig,
        population: &GenomeMap<G>,
        _: &[Species<G>],
        best: &Genome<G>,
    ) {
        if let Some(stats) = Stats::from(population.values().filter_map(Genome::reward)) {
            info!("Population's reward: {}", stats);
        }
        if let Some(stats) = Stats::from(population.values().filter_map(eligible_fitness)) {
            info!("Population's novelty: {}", stats);
        }
        info!("Best {}", best);
    }

    fn complete_extinction(&mut self) {
        warn!("All species extinct.");
    }

    fn end_generation(
        &mut self,
        _: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
    ) {
        info!(
            "Population of {} members in {} species",
            population.len(),
            species.len()
        );
        for s in species {
            debug!(
                "  species {:?}: {} members, stagnated {} generations",
                s.id(),
                s.members().len(),
                s.time_stagnated(self.generation)
            );
        }
        if let Some(started) = self.started {
            info!("Generation time: {:.3} sec", started.elapsed().as_secs_f64());
        }
    }

    fn found_solution(&mut self, _: &PopulationConfig, generation: usize, best: &Genome<G>) {
        info!("Best genome after {} generations: {}", generation, best);
    }
}

/// Defines different possible reporting levels for statistics.
#[derive(Clone, Copy, Debug)]
pub enum ReportingLevel {
    /// Clones the entire population.
    AllGenomes,
    /// Clones species and their champions.
    SpeciesChampions,
    /// Clones only the population champion.
    PopulationChampion,
    /// Clones no genomes.
    NoGenomes,
}

/// A snapshot of a generation.
#[derive(Clone, Debug)]
pub struct Log<G> {
    pub generation_number: usize,
    pub generation_sample: GenerationMemberRecord<G>,
    pub species_count: usize,
    pub reward: Option<Stats>,
    /// Statistics of the novelty of genomes above the minimal criterion.
    pub novelty: Option<Stats>,
    pub archive: Option<NoveltySummary>,
}

impl<G> fmt::Display for Log<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log {{\n\
            \tgeneration_number: {:?}\n\
            \tspecies_count: {:?}\n\
            \treward: {:?}\n\
            \tnovelty: {:?}\n\
            \tarchive: {:?}\n\
            }}",
            self.generation_number, self.species_count, self.reward, self.novelty, self.archive
        )
    }
}

/// A struct for reporting basic statistical data.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
    pub median: f64,
}

impl Stats {
    /// Returns statistics about numbers in a sequence,
    /// or `None` if the sequence is empty.
    ///
    /// # Examples
    /// ```
    /// use mcns::logging::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5]).unwrap();
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    ///
    /// assert!(Stats::from([]).is_none());
    /// ```
    pub fn from(data: impl IntoIterator<Item = f64>) -> Option<Stats> {
        let mut data: Vec<f64> = data.into_iter().collect();
        if data.is_empty() {
            return None;
        }
        data.sort_unstable_by(f64::total_cmp);
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };
        Some(Stats {
            maximum: data[data.len() - 1],
            minimum: data[0],
            mean: data.iter().sum::<f64>() / data.len() as f64,
            median,
        })
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {:.5}, median {:.5}, min {:.5}, max {:.5}",
            self.mean, self.median, self.minimum, self.maximum
        )
    }
}

/// A reporting-level dependant store
/// of genomes from a generation.
#[derive(Clone, Debug)]
pub enum GenerationMemberRecord<G> {
    /// Species IDs, genomes and stagnation level.
    Species(Vec<(SpeciesID, Vec<Genome<G>>, usize)>),
    /// Only species IDs, species champions, and stagnation level.
    SpeciesChampions(Vec<(SpeciesID, Genome<G>, usize)>),
    /// Only population champion.
    PopulationChampion(Genome<G>),
    /// Empty.
    None,
}

/// A log of the evolution of a population over time.
/// Champions are the genomes with the highest reward.
#[derive(Clone, Debug)]
pub struct StatisticsReporter<G> {
    reporting_level: ReportingLevel,
    generation: usize,
    novelty: Option<NoveltySummary>,
    logs: Vec<Log<G>>,
}

impl<G: Clone> StatisticsReporter<G> {
    /// Returns a reporter with the appropiate reporting level.
    ///
    /// # Examples
    /// ```
    /// use mcns::logging::{ReportingLevel, StatisticsReporter};
    ///
    /// let reporter = StatisticsReporter::<()>::new(ReportingLevel::NoGenomes);
    /// assert_eq!(reporter.iter().count(), 0);
    /// ```
    pub fn new(reporting_level: ReportingLevel) -> StatisticsReporter<G> {
        StatisticsReporter {
            reporting_level,
            generation: 0,
            novelty: None,
            logs: vec![],
        }
    }

    /// Iterate over all logged snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Log<G>> {
        self.logs.iter()
    }

    /// Returns the best reward of each logged generation.
    pub fn best_rewards(&self) -> Vec<f64> {
        self.logs
            .iter()
            .filter_map(|log| log.reward.as_ref().map(|s| s.maximum))
            .collect()
    }

    fn sample(
        &self,
        population: &GenomeMap<G>,
        species: &[Species<G>],
        best: &Genome<G>,
    ) -> GenerationMemberRecord<G> {
        let members = |s: &Species<G>| -> Vec<Genome<G>> {
            s.members()
                .iter()
                .filter_map(|k| population.get(k))
                .cloned()
                .collect()
        };
        match self.reporting_level {
            ReportingLevel::AllGenomes => GenerationMemberRecord::Species(
                species
                    .iter()
                    .map(|s| (s.id(), members(s), s.time_stagnated(self.generation)))
                    .collect(),
            ),
            ReportingLevel::SpeciesChampions => GenerationMemberRecord::SpeciesChampions(
                species
                    .iter()
                    .filter_map(|s| {
                        champion(members(s).into_iter())
                            .map(|c| (s.id(), c, s.time_stagnated(self.generation)))
                    })
                    .collect(),
            ),
            ReportingLevel::PopulationChampion => {
                GenerationMemberRecord::PopulationChampion(best.clone())
            }
            ReportingLevel::NoGenomes => GenerationMemberRecord::None,
        }
    }
}

impl<G: Clone> Reporter<G> for StatisticsReporter<G> {
    fn start_generation(&mut self, generation: usize) {
        self.generation = generation;
        self.novelty = None;
    }

    fn post_novelty(&mut self, summary: &NoveltySummary) {
        self.novelty = Some(*summary);
    }

    fn post_evaluate(
        &mut self,
        _: &PopulationConfig,
        population: &GenomeMap<G>,
        species: &[Species<G>],
        best: &Genome<G>,
    ) {
        let log = Log {
            generation_number: self.generation,
            generation_sample: self.sample(population, species, best),
            species_count: species.len(),
            reward: Stats::from(population.values().filter_map(Genome::reward)),
            novelty: Stats::from(population.values().filter_map(eligible_fitness)),
            archive: self.novelty.take(),
        };
        self.logs.push(log);
    }
}

/// Fitness of genomes that cleared the minimal criterion,
/// if finite.
fn eligible_fitness<G>(genome: &Genome<G>) -> Option<f64> {
    genome
        .fitness()
        .filter(|f| *f != INELIGIBLE_FITNESS && f.is_finite())
}

/// The genome with the highest reward, the earliest one on ties.
fn champion<G>(genomes: impl Iterator<Item = Genome<G>>) -> Option<Genome<G>> {
    let mut best: Option<Genome<G>> = None;
    for genome in genomes {
        let better = match (&best, genome.reward()) {
            (None, _) => true,
            (Some(b), Some(r)) => b.reward().map_or(true, |br| r > br),
            (Some(_), None) => false,
        };
        if better {
            best = Some(genome);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::test_util::{population, Point};
    use crate::populations::{Speciation, SpeciesSet};

    #[test]
    fn stats_even_median() {
        let stats = Stats::from([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.mean, 2.5);
    }

    #[test]
    fn statistics_reporter_records_generations() {
        let mut config = PopulationConfig::zero();
        config.speciation.compatibility_threshold = 1.0;
        let mut pop = population(&[(0.2, &[0.0]), (0.9, &[5.0]), (0.9, &[0.5])]);
        for (fitness, genome) in [-1.0, 3.0, 2.0].iter().zip(pop.values_mut()) {
            genome.set_fitness(*fitness);
        }
        let mut species = SpeciesSet::new();
        species.speciate(&config, &1, &pop, 0);

        let mut reporter = StatisticsReporter::<Point>::new(ReportingLevel::SpeciesChampions);
        let summary = NoveltySummary {
            eligible: 2,
            admitted: 1,
            archive_size: 1,
            threshold: 6.0,
            stagnation: 0,
        };
        reporter.start_generation(4);
        reporter.post_novelty(&summary);
        reporter.post_evaluate(&config, &pop, species.species(), &pop[&1]);

        let log = reporter.iter().next().unwrap();
        assert_eq!(log.generation_number, 4);
        assert_eq!(log.species_count, 2);
        assert_eq!(log.archive, Some(summary));
        assert_eq!(log.reward.as_ref().unwrap().maximum, 0.9);
        assert_eq!(log.novelty.as_ref().unwrap().minimum, 2.0);
        match &log.generation_sample {
            GenerationMemberRecord::SpeciesChampions(champions) => {
                let keys: Vec<_> = champions.iter().map(|(_, g, _)| g.key()).collect();
                assert_eq!(keys, vec![2, 1]);
            }
            other => panic!("unexpected sample {:?}", other),
        }
        assert_eq!(reporter.best_rewards(), vec![0.9]);
    }

    #[test]
    fn shared_reporters_stay_inspectable() {
        let shared = Arc::new(Mutex::new(StatisticsReporter::<Point>::new(
            ReportingLevel::NoGenomes,
        )));
        let mut set = ReporterSet::new();
        set.add(shared.clone());
        set.add(LogReporter::new());
        assert_eq!(set.len(), 2);

        let pop = population(&[(1.0, &[0.0])]);
        set.start_generation(0);
        set.post_evaluate(&PopulationConfig::zero(), &pop, &[], &pop[&0]);
        assert_eq!(shared.lock().unwrap().iter().count(), 1);
    }

    #[test]
    fn removal_keeps_remaining_reporters_in_order() {
        let first = Arc::new(Mutex::new(StatisticsReporter::<Point>::new(
            ReportingLevel::NoGenomes,
        )));
        let second = Arc::new(Mutex::new(StatisticsReporter::<Point>::new(
            ReportingLevel::NoGenomes,
        )));
        let mut set = ReporterSet::new();
        let a = set.add(first.clone());
        let b = set.add(LogReporter::new());
        let c = set.add(second.clone());
        assert_ne!(a, c);

        assert!(set.remove(b).is_some());
        assert!(set.remove(b).is_none());
        assert!(set.remove(a).is_some());
        assert_eq!(set.len(), 1);

        let pop = population(&[(1.0, &[0.0])]);
        set.start_generation(0);
        set.post_evaluate(&PopulationConfig::zero(), &pop, &[], &pop[&0]);
        assert_eq!(first.lock().unwrap().iter().count(), 0);
        assert_eq!(second.lock().unwrap().iter().count(), 1);
        assert_ne!(set.add(LogReporter::new()), b);
    }

    #[test]
    fn log_reporter_walks_species() {
        let mut config = PopulationConfig::zero();
        config.speciation.compatibility_threshold = 1.0;
        let pop = population(&[(0.2, &[0.0]), (0.9, &[5.0])]);
        let mut species = SpeciesSet::new();
        species.speciate(&config, &1, &pop, 0);

        let mut log = LogReporter::new();
        let reporter: &mut dyn Reporter<Point> = &mut log;
        reporter.start_generation(0);
        reporter.post_evaluate(&config, &pop, species.species(), &pop[&1]);
        reporter.end_generation(&config, &pop, species.species());
        reporter.found_solution(&config, 0, &pop[&1]);
        assert_eq!(species.species().len(), 2);
    }
}
