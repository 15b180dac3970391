//! A deceptive maze: a wall stands between the start and the goal,
//! so heading straight for the goal leads into a dead end.
use crate::controller::{Controller, INPUTS};

pub const START: [f64; 2] = [0.5, 0.1];
pub const GOAL: [f64; 2] = [0.5, 0.9];
/// The wall spans `WALL_X` at height `WALL_Y`.
pub const WALL_Y: f64 = 0.5;
pub const WALL_X: (f64, f64) = (0.2, 0.8);
pub const STEPS: usize = 40;
/// Distance covered in a step at full speed.
pub const SPEED: f64 = 0.05;

/// Outcome of a trial: reward and final position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trial {
    pub reward: f64,
    pub position: [f64; 2],
}

/// Lets the controller drive the robot from the start for
/// [`STEPS`] steps. The reward is the fraction of the initial
/// distance to the goal that was covered.
pub fn simulate(controller: &Controller) -> Trial {
    let mut position = START;
    for _ in 0..STEPS {
        let inputs: [f64; INPUTS] = [
            position[0],
            position[1],
            GOAL[0] - position[0],
            GOAL[1] - position[1],
            1.0,
        ];
        let [vx, vy] = controller.activate(&inputs);
        position = step(position, [vx * SPEED, vy * SPEED]);
    }
    Trial {
        reward: 1.0 - distance(position, GOAL) / distance(START, GOAL),
        position,
    }
}

/// Moves by `delta` inside the unit square,
/// unless the move would cross the wall.
fn step(from: [f64; 2], delta: [f64; 2]) -> [f64; 2] {
    let to = [
        (from[0] + delta[0]).clamp(0.0, 1.0),
        (from[1] + delta[1]).clamp(0.0, 1.0),
    ];
    if crosses_wall(from, to) {
        from
    } else {
        to
    }
}

fn crosses_wall(from: [f64; 2], to: [f64; 2]) -> bool {
    let (a, b) = (from[1] - WALL_Y, to[1] - WALL_Y);
    if a * b > 0.0 || a == b {
        return false;
    }
    let t = a / (a - b);
    let x = from[0] + t * (to[0] - from[0]);
    (WALL_X.0..=WALL_X.1).contains(&x)
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use mcns::Genotype;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn wall_blocks_direct_route() {
        assert_eq!(step([0.5, 0.375], [0.0, 0.25]), [0.5, 0.375]);
        assert_eq!(step([0.125, 0.375], [0.0, 0.25]), [0.125, 0.625]);
        assert_eq!(step([0.5, 0.125], [0.0, 0.25]), [0.5, 0.375]);
    }

    #[test]
    fn moves_stay_in_bounds() {
        assert_eq!(step([0.875, 0.125], [0.25, -0.25]), [1.0, 0.0]);
    }

    #[test]
    fn standing_still_earns_nothing() {
        let config = ControllerConfig {
            weight_bound: 0.0,
            mutation_chance: 0.0,
            mutation_power: 0.0,
        };
        let standing = Controller::new(&config, &mut StdRng::seed_from_u64(0));
        let trial = simulate(&standing);
        assert_eq!(trial.position, START);
        assert_eq!(trial.reward, 0.0);
    }
}
