use super::ConfigError;
use crate::novelty::Metric;

use serde::{Deserialize, Serialize};

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Configuration data for population generation,
/// novelty scoring and evolution.
///
/// # Note
/// All quantities expressing probabilities or fractions
/// should be in the range [0.0, 1.0]. [`validate`] checks
/// the ones whose misuse would break evolution.
///
/// [`validate`]: PopulationConfig::validate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Size of the population.
    pub size: NonZeroUsize,
    /// Function of the population's rewards compared
    /// against [`fitness_threshold`] to decide whether
    /// a solution has been found.
    ///
    /// [`fitness_threshold`]: PopulationConfig::fitness_threshold
    pub fitness_criterion: FitnessCriterion,
    /// Value the fitness criterion must reach for
    /// evolution to stop.
    pub fitness_threshold: f64,
    /// If set, evolution only stops after the requested
    /// number of generations, and the fitness criterion
    /// is ignored.
    pub no_fitness_termination: bool,
    /// Whether a new random population is created when
    /// all species go extinct. Otherwise extinction
    /// ends evolution with an error.
    pub reset_on_extinction: bool,
    /// Novelty scoring parameters.
    pub novelty: NoveltyConfig,
    /// Parameters of the default reproduction scheme.
    pub reproduction: ReproductionConfig,
    /// Parameters of the default speciation scheme.
    pub speciation: SpeciationConfig,
}

/// Configuration of novelty scoring and of the novelty archive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoveltyConfig {
    /// Distance function between behavior descriptors.
    pub metric: Metric,
    /// Initial archive admission threshold.
    pub threshold_init: f64,
    /// Lowest value the admission threshold can shrink to.
    pub threshold_floor: f64,
    /// Number of nearest neighbors considered for fitness.
    pub neighbors: NonZeroUsize,
    /// Minimal criterion: lowest reward a genome must
    /// obtain to be scored by novelty at all.
    pub mcns: f64,
}

/// Configuration of the default reproduction scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReproductionConfig {
    /// Top n of each species which is copied
    /// as-is to the next generation.
    pub elitism: usize,
    /// Top fraction of each species which can
    /// participate in mating.
    pub survival_threshold: f64,
    /// Chance that the second parent is taken
    /// from a different species.
    pub interspecies_mating_chance: f64,
    /// Number of generations without a fitness
    /// increase after which a species is removed.
    pub max_stagnation: NonZeroUsize,
    /// Number of best species protected from
    /// removal due to stagnation.
    pub species_elitism: usize,
    /// Attempts at producing a genome that satisfies
    /// the population's constraint before giving up.
    pub max_constraint_attempts: NonZeroUsize,
    /// Seed for the reproduction random number generator.
    /// A random seed is used if unset.
    pub seed: Option<u64>,
}

/// Configuration of the default speciation scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeciationConfig {
    /// Genetic distance threshold, beyond which
    /// genomes are considered as belonging to
    /// different species.
    pub compatibility_threshold: f64,
}

/// Aggregation of the population's rewards used
/// to decide termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitnessCriterion {
    Max,
    Min,
    Mean,
}

impl FitnessCriterion {
    /// Applies the criterion to a set of values.
    /// Returns `None` if there are no values.
    ///
    /// # Examples
    /// ```
    /// use mcns::FitnessCriterion;
    ///
    /// let rewards = [0.5, 0.25, 0.75];
    /// assert_eq!(FitnessCriterion::Max.apply(rewards), Some(0.75));
    /// assert_eq!(FitnessCriterion::Min.apply(rewards), Some(0.25));
    /// assert_eq!(FitnessCriterion::Mean.apply(rewards), Some(0.5));
    /// assert_eq!(FitnessCriterion::Mean.apply([]), None);
    /// ```
    pub fn apply(self, values: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut values = values.into_iter();
        let first = values.next()?;
        Some(match self {
            FitnessCriterion::Max => values.fold(first, f64::max),
            FitnessCriterion::Min => values.fold(first, f64::min),
            FitnessCriterion::Mean => {
                let (sum, count) = values.fold((first, 1usize), |(s, c), v| (s + v, c + 1));
                sum / count as f64
            }
        })
    }
}

impl FromStr for FitnessCriterion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<FitnessCriterion, ConfigError> {
        match s {
            "max" => Ok(FitnessCriterion::Max),
            "min" => Ok(FitnessCriterion::Min),
            "mean" => Ok(FitnessCriterion::Mean),
            _ => Err(ConfigError::UnknownFitnessCriterion(s.to_owned())),
        }
    }
}

impl fmt::Display for FitnessCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FitnessCriterion::Max => "max",
            FitnessCriterion::Min => "min",
            FitnessCriterion::Mean => "mean",
        })
    }
}

impl PopulationConfig {
    /// Returns a "zero-valued" default configuration.
    /// All values are 0, false, unset, or in the case of
    /// `NonZeroUsize`s, 1. The criterion is `Max` and the
    /// metric `Manhattan`.
    ///
    /// # Note
    /// This value is not suitable for use in most experiments.
    /// It is meant as a way to abbreviate configuration
    /// instantiation, or to fill in unused values.
    ///
    /// # Examples
    /// ```
    /// use mcns::PopulationConfig;
    /// use std::num::NonZeroUsize;
    ///
    /// let cfg1 = PopulationConfig::zero();
    ///
    /// let cfg2 = PopulationConfig {
    ///     // Specify some values here...
    ///     size: NonZeroUsize::new(150).unwrap(),
    ///     fitness_threshold: 1.0,
    ///     // Default the rest...
    ///     ..PopulationConfig::zero()
    /// };
    /// ```
    pub const fn zero() -> PopulationConfig {
        PopulationConfig {
            size: NonZeroUsize::MIN,
            fitness_criterion: FitnessCriterion::Max,
            fitness_threshold: 0.0,
            no_fitness_termination: false,
            reset_on_extinction: false,
            novelty: NoveltyConfig::zero(),
            reproduction: ReproductionConfig::zero(),
            speciation: SpeciationConfig::zero(),
        }
    }

    /// Checks that the configuration can drive evolution.
    ///
    /// # Errors
    /// Returns an error if the novelty threshold or its floor
    /// are negative or not finite, if the floor exceeds the initial
    /// threshold, if the survival threshold or the interspecies
    /// mating chance are not in [0, 1] (the former must also be
    /// positive), or if the compatibility threshold is negative.
    ///
    /// # Examples
    /// ```
    /// use mcns::PopulationConfig;
    ///
    /// let mut config = PopulationConfig::zero();
    /// config.novelty.threshold_init = 6.0;
    /// config.reproduction.survival_threshold = 0.2;
    /// assert!(config.validate().is_ok());
    ///
    /// config.reproduction.survival_threshold = 0.0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let novelty = &self.novelty;
        if !(novelty.threshold_floor.is_finite()
            && novelty.threshold_init.is_finite()
            && novelty.threshold_floor >= 0.0
            && novelty.threshold_init >= novelty.threshold_floor)
        {
            return Err(ConfigError::InvalidNoveltyThreshold {
                init: novelty.threshold_init,
                floor: novelty.threshold_floor,
            });
        }
        let survival = self.reproduction.survival_threshold;
        if !(survival > 0.0 && survival <= 1.0) {
            return Err(ConfigError::InvalidFraction {
                name: "survival_threshold",
                value: survival,
            });
        }
        let interspecies = self.reproduction.interspecies_mating_chance;
        if !(0.0..=1.0).contains(&interspecies) {
            return Err(ConfigError::InvalidFraction {
                name: "interspecies_mating_chance",
                value: interspecies,
            });
        }
        let compatibility = self.speciation.compatibility_threshold;
        if !(compatibility >= 0.0) {
            return Err(ConfigError::InvalidCompatibilityThreshold(compatibility));
        }
        Ok(())
    }
}

impl NoveltyConfig {
    /// Returns a "zero-valued" novelty configuration.
    /// See [`PopulationConfig::zero`].
    pub const fn zero() -> NoveltyConfig {
        NoveltyConfig {
            metric: Metric::Manhattan,
            threshold_init: 0.0,
            threshold_floor: 0.0,
            neighbors: NonZeroUsize::MIN,
            mcns: 0.0,
        }
    }
}

impl ReproductionConfig {
    /// Returns a "zero-valued" reproduction configuration.
    /// See [`PopulationConfig::zero`].
    pub const fn zero() -> ReproductionConfig {
        ReproductionConfig {
            elitism: 0,
            survival_threshold: 0.0,
            interspecies_mating_chance: 0.0,
            max_stagnation: NonZeroUsize::MIN,
            species_elitism: 0,
            max_constraint_attempts: NonZeroUsize::MIN,
            seed: None,
        }
    }
}

impl SpeciationConfig {
    /// Returns a "zero-valued" speciation configuration.
    /// See [`PopulationConfig::zero`].
    pub const fn zero() -> SpeciationConfig {
        SpeciationConfig {
            compatibility_threshold: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PopulationConfig {
        let mut config = PopulationConfig::zero();
        config.novelty.threshold_init = 6.0;
        config.novelty.threshold_floor = 0.001;
        config.reproduction.survival_threshold = 0.2;
        config.speciation.compatibility_threshold = 3.0;
        config
    }

    #[test]
    fn validate() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.novelty.threshold_floor = 7.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNoveltyThreshold { .. })
        ));

        let mut config = valid();
        config.reproduction.interspecies_mating_chance = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFraction { name: "interspecies_mating_chance", .. })
        ));

        let mut config = valid();
        config.speciation.compatibility_threshold = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCompatibilityThreshold(_))
        ));
    }

    #[test]
    fn fitness_criterion_by_name() {
        assert_eq!("mean".parse::<FitnessCriterion>().unwrap(), FitnessCriterion::Mean);
        assert!(matches!(
            "median".parse::<FitnessCriterion>(),
            Err(ConfigError::UnknownFitnessCriterion(name)) if name == "median"
        ));
    }

    #[test]
    fn deserializes_by_name() {
        let json = r#"{
            "size": 10,
            "fitness_criterion": "max",
            "fitness_threshold": 1.0,
            "no_fitness_termination": true,
            "reset_on_extinction": false,
            "novelty": {
                "metric": "manhattan",
                "threshold_init": 6.0,
                "threshold_floor": 0.001,
                "neighbors": 5,
                "mcns": 0.1
            },
            "reproduction": {
                "elitism": 1,
                "survival_threshold": 0.2,
                "interspecies_mating_chance": 0.001,
                "max_stagnation": 15,
                "species_elitism": 2,
                "max_constraint_attempts": 10,
                "seed": 42
            },
            "speciation": { "compatibility_threshold": 3.0 }
        }"#;
        let config: PopulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.size.get(), 10);
        assert_eq!(config.novelty.metric, Metric::Manhattan);
        assert_eq!(config.novelty.neighbors.get(), 5);
        assert_eq!(config.reproduction.seed, Some(42));

        let unknown_metric = json.replace("\"manhattan\"", "\"hamming\"");
        assert!(serde_json::from_str::<PopulationConfig>(&unknown_metric).is_err());
    }
}
