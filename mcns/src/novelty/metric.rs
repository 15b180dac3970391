use crate::populations::ConfigError;

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Distance functions available for comparing behavior descriptors.
///
/// Metrics are selected by name in the configuration; an unknown
/// name is rejected when the configuration is parsed.
///
/// # Examples
/// ```
/// use mcns::novelty::Metric;
///
/// let metric: Metric = "manhattan".parse().unwrap();
/// assert_eq!(metric.distance(&[0.0, 0.0], &[3.0, -4.0]), 7.0);
/// assert!("cosine".parse::<Metric>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Sum of absolute coordinate differences.
    Manhattan,
    /// Straight-line distance.
    Euclidean,
    /// Largest absolute coordinate difference.
    Chebyshev,
}

impl Metric {
    /// Returns the distance between two behavior descriptors.
    ///
    /// Coordinates are paired up to the length of the shorter
    /// descriptor. Callers comparing descriptors of a population
    /// reject mismatched lengths before measuring.
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        let differences = a.iter().zip(b).map(|(x, y)| (x - y).abs());
        match self {
            Metric::Manhattan => differences.sum(),
            Metric::Euclidean => differences.map(|d| d * d).sum::<f64>().sqrt(),
            Metric::Chebyshev => differences.fold(0.0, f64::max),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Manhattan => "manhattan",
            Metric::Euclidean => "euclidean",
            Metric::Chebyshev => "chebyshev",
        }
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Metric, ConfigError> {
        match s {
            "manhattan" => Ok(Metric::Manhattan),
            "euclidean" => Ok(Metric::Euclidean),
            "chebyshev" => Ok(Metric::Chebyshev),
            _ => Err(ConfigError::UnknownMetric(s.to_owned())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        let (a, b) = ([1.0, 2.0, 3.0], [4.0, 6.0, 3.0]);
        assert_eq!(Metric::Manhattan.distance(&a, &b), 7.0);
        assert_eq!(Metric::Euclidean.distance(&a, &b), 5.0);
        assert_eq!(Metric::Chebyshev.distance(&a, &b), 4.0);
    }

    #[test]
    fn symmetric_and_zero_on_self() {
        let (a, b) = ([0.25, -1.5], [2.0, 0.5]);
        for metric in [Metric::Manhattan, Metric::Euclidean, Metric::Chebyshev] {
            assert_eq!(metric.distance(&a, &b), metric.distance(&b, &a));
            assert_eq!(metric.distance(&a, &a), 0.0);
        }
    }

    #[test]
    fn extra_coordinates_are_ignored() {
        assert_eq!(Metric::Manhattan.distance(&[1.0, 2.0, 9.0], &[0.0, 0.0]), 3.0);
    }

    #[test]
    fn names_round_trip() {
        for metric in [Metric::Manhattan, Metric::Euclidean, Metric::Chebyshev] {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
            assert_eq!(
                serde_json::to_string(&metric).unwrap(),
                format!("\"{}\"", metric)
            );
        }
    }

    #[test]
    fn unknown_metric() {
        match "hamming".parse::<Metric>() {
            Err(ConfigError::UnknownMetric(name)) => assert_eq!(name, "hamming"),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(serde_json::from_str::<Metric>("\"hamming\"").is_err());
    }
}
