//! A single-layer controller for the maze robot.
use mcns::Genotype;

use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Sensor readings: position, offset to the goal, and a bias.
pub const INPUTS: usize = 5;
/// Requested velocity along each axis.
pub const OUTPUTS: usize = 2;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum absolute value of any weight.
    pub weight_bound: f64,
    /// Chance of each weight of a child being perturbed.
    pub mutation_chance: f64,
    /// Standard deviation of weight perturbations.
    pub mutation_power: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    weights: Vec<f64>,
}

impl Controller {
    /// Maps sensor readings to a velocity, each component in [-1, 1].
    pub fn activate(&self, inputs: &[f64; INPUTS]) -> [f64; OUTPUTS] {
        let mut outputs = [0.0; OUTPUTS];
        for (output, weights) in outputs.iter_mut().zip(self.weights.chunks(INPUTS)) {
            *output = weights
                .iter()
                .zip(inputs)
                .map(|(w, i)| w * i)
                .sum::<f64>()
                .tanh();
        }
        outputs
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Genotype for Controller {
    type Config = ControllerConfig;

    fn new(config: &ControllerConfig, rng: &mut dyn RngCore) -> Controller {
        let bound = config.weight_bound;
        Controller {
            weights: (0..INPUTS * OUTPUTS)
                .map(|_| rng.gen_range(-bound..=bound))
                .collect(),
        }
    }

    /// Mean absolute difference between weights.
    fn genetic_distance(first: &Controller, second: &Controller, _: &ControllerConfig) -> f64 {
        let total: f64 = first
            .weights
            .iter()
            .zip(&second.weights)
            .map(|(a, b)| (a - b).abs())
            .sum();
        total / first.weights.len().max(1) as f64
    }

    /// Uniform crossover followed by gaussian weight perturbations.
    fn mate(
        parent1: &Controller,
        parent2: &Controller,
        config: &ControllerConfig,
        rng: &mut dyn RngCore,
    ) -> Controller {
        let weights = parent1
            .weights
            .iter()
            .zip(&parent2.weights)
            .map(|(a, b)| {
                let mut w = if rng.gen::<bool>() { *a } else { *b };
                if rng.gen::<f64>() < config.mutation_chance {
                    let noise: f64 = rng.sample(StandardNormal);
                    w += noise * config.mutation_power;
                }
                w.clamp(-config.weight_bound, config.weight_bound)
            })
            .collect();
        Controller { weights }
    }
}
