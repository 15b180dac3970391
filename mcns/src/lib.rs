//! An implementation of minimal-criterion novelty search over
//! NEAT-style speciated populations, following
//! Lehman & Stanley, 2010: <http://eplex.cs.ucf.edu/papers/lehman_gecco10b.pdf>
//!
//! Genomes are first evaluated on a task, yielding a _reward_ and a
//! _behavior descriptor_. Genomes whose reward falls below the minimal
//! criterion are ineligible for selection; the rest are scored by the
//! novelty of their behavior with respect to the current population and
//! to an archive of previously novel behaviors, whose admission threshold
//! adapts itself over time. Reproduction then selects on novelty, while
//! the best genome by reward is tracked as the result of the search.
//!
//! The genome encoding is user-defined via the [`Genotype`] trait, and
//! reproduction and speciation can be replaced through the
//! [`Reproduction`] and [`Speciation`] traits. Progress can be observed
//! with [`Reporter`](logging::Reporter)s, and runs can be checkpointed.
//!
//! # Example usage: Novelty search for points near the origin
//! ```
//! use mcns::logging::LogReporter;
//! use mcns::{Genotype, Population, PopulationConfig};
//! use rand::{Rng, RngCore};
//! use serde::Serialize;
//! use std::num::NonZeroUsize;
//!
//! #[derive(Clone, Serialize)]
//! struct Point(Vec<f64>);
//!
//! impl Genotype for Point {
//!     type Config = usize;
//!
//!     fn new(dimensions: &usize, rng: &mut dyn RngCore) -> Point {
//!         Point((0..*dimensions).map(|_| rng.gen_range(-10.0..10.0)).collect())
//!     }
//!
//!     fn genetic_distance(a: &Point, b: &Point, _: &usize) -> f64 {
//!         a.0.iter().zip(&b.0).map(|(x, y)| (x - y).abs()).sum()
//!     }
//!
//!     fn mate(a: &Point, b: &Point, _: &usize, rng: &mut dyn RngCore) -> Point {
//!         Point(
//!             a.0.iter()
//!                 .zip(&b.0)
//!                 .map(|(x, y)| (x + y) / 2.0 + rng.gen_range(-0.5..0.5))
//!                 .collect(),
//!         )
//!     }
//! }
//!
//! fn main() {
//!     let mut config = PopulationConfig {
//!         size: NonZeroUsize::new(50).unwrap(),
//!         fitness_threshold: -0.5,
//!         ..PopulationConfig::zero()
//!     };
//!     config.novelty.threshold_init = 2.0;
//!     config.novelty.threshold_floor = 0.001;
//!     config.novelty.neighbors = NonZeroUsize::new(5).unwrap();
//!     config.novelty.mcns = -15.0;
//!     config.reproduction.elitism = 1;
//!     config.reproduction.survival_threshold = 0.2;
//!     config.reproduction.max_stagnation = NonZeroUsize::new(15).unwrap();
//!     config.reproduction.species_elitism = 2;
//!     config.speciation.compatibility_threshold = 3.0;
//!
//!     let mut population = Population::<Point>::with_defaults(config, 2).unwrap();
//!     population.add_reporter(LogReporter::new());
//!
//!     let best = population.run(
//!         |genomes, _, _| {
//!             for genome in genomes.values_mut() {
//!                 let position = genome.genes().0.clone();
//!                 let distance: f64 = position.iter().map(|x| x.abs()).sum();
//!                 genome.record_evaluation(-distance, position);
//!             }
//!         },
//!         Some(30),
//!     );
//!
//!     match best {
//!         Ok(Some(best)) => println!("Best: {}", serde_json::to_string(&best).unwrap()),
//!         Ok(None) => println!("No generation was run"),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! ```

mod genome;
pub mod novelty;
mod populations;

pub use genome::*;
pub use populations::*;
