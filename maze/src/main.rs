mod controller;
mod maze;

use controller::{Controller, ControllerConfig};
use mcns::logging::{LogReporter, ReportingLevel, Stats, StatisticsReporter};
use mcns::{
    Checkpoint, Constraint, DefaultReproduction, Genome, GenomeMap, NoveltyPersistence,
    Population, PopulationConfig, RunStatus, SpeciesSet,
};

use log::info;
use rayon::prelude::*;
use serde::Deserialize;

use std::error::Error;
use std::sync::{Arc, Mutex};

#[derive(Deserialize)]
struct Experiment {
    population: PopulationConfig,
    controller: ControllerConfig,
    generations: usize,
}

fn evaluate_maze(genomes: &mut GenomeMap<Controller>, _: &PopulationConfig, _: usize) {
    genomes.par_iter_mut().for_each(|(_, genome)| {
        let trial = maze::simulate(genome.genes());
        genome.record_evaluation(trial.reward, trial.position.to_vec());
    });
}

fn finite_weights() -> Box<Constraint<Controller>> {
    Box::new(|c: &Controller| c.weights().iter().all(|w| w.is_finite()))
}

type Statistics = Arc<Mutex<StatisticsReporter<Controller>>>;

/// Runs the first half of the experiment, round trips the search
/// through a checkpoint, then runs the second half. A search that is
/// solved in the first half is not resumed.
fn run_experiment(
    experiment: &Experiment,
    statistics: &Statistics,
) -> Result<(Population<Controller>, Option<Genome<Controller>>), Box<dyn Error>> {
    let mut population: Population<Controller> = Population::new(
        experiment.population.clone(),
        experiment.controller.clone(),
        DefaultReproduction::new(&experiment.population),
        SpeciesSet::new(),
        Some(finite_weights()),
    )?;
    population.add_reporter(LogReporter::new());
    population.add_reporter(statistics.clone());

    let half = experiment.generations / 2;
    let best = population.run(evaluate_maze, Some(half))?;
    if population.status() == RunStatus::SolutionFound {
        info!("Solved in generation {}", population.generation());
        return Ok((population, best));
    }

    // Round trip the search through a checkpoint, as a long
    // experiment would between sessions.
    let checkpoint = ron::to_string(&population.checkpoint(NoveltyPersistence::Include))?;
    let checkpoint: Checkpoint<Controller, SpeciesSet<Controller>> = ron::from_str(&checkpoint)?;
    let mut population = Population::resume(
        checkpoint,
        experiment.population.clone(),
        experiment.controller.clone(),
        DefaultReproduction::new(&experiment.population),
        Some(finite_weights()),
    )?;
    population.add_reporter(LogReporter::new());
    population.add_reporter(statistics.clone());
    let best = population.run(evaluate_maze, Some(experiment.generations - half))?;
    Ok((population, best))
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/config.ron").to_owned());
    let experiment: Experiment = ron::from_str(&std::fs::read_to_string(&path)?)?;

    let statistics = Arc::new(Mutex::new(StatisticsReporter::new(
        ReportingLevel::PopulationChampion,
    )));
    let (population, best) = run_experiment(&experiment, &statistics)?;

    if let Ok(statistics) = statistics.lock() {
        println!(
            "Best reward per generation: {:?}",
            Stats::from(statistics.best_rewards())
        );
    }
    info!(
        "{} genomes archived, threshold {:.4}",
        population.archive().len(),
        population.archive().threshold()
    );
    match best {
        Some(best) => println!("Best genome: {}", ron::to_string(&best)?),
        None => println!("No generation was run"),
    }
    Ok(())
}
