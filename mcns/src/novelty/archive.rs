use crate::genome::{Genome, GenomeKey, GenomeMap};

use log::debug;
use serde::{Deserialize, Serialize};

/// Consecutive generations without admissions
/// after which the threshold is lowered.
pub const STAGNATION_LIMIT: usize = 5;
/// Factor applied to the threshold after stagnation.
pub const SHRINK_FACTOR: f64 = 0.95;
/// Admissions in a single generation that raise the threshold.
pub const GROWTH_ADMISSIONS: usize = 4;
/// Factor applied to the threshold after many admissions.
pub const GROWTH_FACTOR: f64 = 1.2;

/// The persistent part of a novelty search, which may be
/// stored alongside a checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchState<G> {
    pub archive: GenomeMap<G>,
    pub threshold: f64,
    pub stagnation: usize,
}

/// An archive of genomes whose behavior was novel enough
/// when they were observed, together with the self-adjusting
/// admission threshold.
///
/// Admission happens in two steps: candidates are first
/// _staged_ during a scoring pass, where they already count
/// as neighbors for genomes scored later in the same pass,
/// and are then _committed_ at the end of the generation.
/// Archived genomes are snapshots and are never modified
/// or removed.
#[derive(Clone, Debug)]
pub struct NoveltyArchive<G> {
    archive: GenomeMap<G>,
    staged: GenomeMap<G>,
    threshold: f64,
    floor: f64,
    stagnation: usize,
}

impl<G: Clone> NoveltyArchive<G> {
    /// Creates an empty archive with the given initial
    /// admission threshold and threshold floor.
    ///
    /// # Examples
    /// ```
    /// use mcns::novelty::NoveltyArchive;
    ///
    /// let archive = NoveltyArchive::<()>::new(6.0, 0.001);
    /// assert!(archive.is_empty());
    /// assert_eq!(archive.threshold(), 6.0);
    /// assert_eq!(archive.stagnation(), 0);
    /// ```
    pub fn new(threshold: f64, floor: f64) -> NoveltyArchive<G> {
        NoveltyArchive {
            archive: GenomeMap::new(),
            staged: GenomeMap::new(),
            threshold,
            floor,
            stagnation: 0,
        }
    }

    /// Rebuilds an archive from a stored search state.
    pub fn restore(state: SearchState<G>, floor: f64) -> NoveltyArchive<G> {
        NoveltyArchive {
            archive: state.archive,
            staged: GenomeMap::new(),
            threshold: state.threshold,
            floor,
            stagnation: state.stagnation,
        }
    }

    /// Returns a copy of the archive's committed state.
    pub fn search_state(&self) -> SearchState<G> {
        SearchState {
            archive: self.archive.clone(),
            threshold: self.threshold,
            stagnation: self.stagnation,
        }
    }

    /// Stages a snapshot of `genome` for admission if its
    /// archive density exceeds the current threshold.
    /// Returns whether the genome was staged.
    ///
    /// # Examples
    /// ```
    /// use mcns::Genome;
    /// use mcns::novelty::NoveltyArchive;
    ///
    /// let mut archive = NoveltyArchive::new(1.0, 0.1);
    /// assert!(!archive.admit_candidate(&Genome::new(0, ()), 1.0));
    /// assert!(archive.admit_candidate(&Genome::new(1, ()), f64::INFINITY));
    /// assert_eq!(archive.staged().len(), 1);
    /// assert!(archive.is_empty());
    /// ```
    pub fn admit_candidate(&mut self, genome: &Genome<G>, archive_density: f64) -> bool {
        if archive_density > self.threshold {
            self.staged.insert(genome.key(), genome.clone());
            true
        } else {
            false
        }
    }

    /// Moves all staged genomes into the archive and
    /// updates the stagnation counter. Returns the
    /// number of genomes that were staged.
    pub fn commit(&mut self) -> usize {
        let admitted = self.staged.len();
        if admitted > 0 {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }
        self.archive.append(&mut self.staged);
        admitted
    }

    /// Adjusts the admission threshold after a commit of
    /// `admitted` genomes.
    ///
    /// After [`STAGNATION_LIMIT`] generations without admissions
    /// the threshold shrinks (never below the floor) and the counter
    /// restarts. Independently, [`GROWTH_ADMISSIONS`] or more
    /// admissions grow the threshold. Both may apply in one call,
    /// shrinking first.
    pub fn adapt_threshold(&mut self, admitted: usize) {
        if self.stagnation >= STAGNATION_LIMIT {
            self.threshold *= SHRINK_FACTOR;
            if self.threshold < self.floor {
                self.threshold = self.floor;
            }
            self.stagnation = 0;
            debug!("novelty threshold lowered to {}", self.threshold);
        }
        if admitted >= GROWTH_ADMISSIONS {
            self.threshold *= GROWTH_FACTOR;
            debug!("novelty threshold raised to {}", self.threshold);
        }
    }

    /// Genomes staged for admission in the current generation.
    pub fn staged(&self) -> &GenomeMap<G> {
        &self.staged
    }

    /// Committed genomes.
    pub fn genomes(&self) -> &GenomeMap<G> {
        &self.archive
    }

    pub fn get(&self, key: GenomeKey) -> Option<&Genome<G>> {
        self.archive.get(&key)
    }

    pub fn contains(&self, key: GenomeKey) -> bool {
        self.archive.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Consecutive generations without admissions.
    pub fn stagnation(&self) -> usize {
        self.stagnation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn stage(archive: &mut NoveltyArchive<()>, keys: std::ops::Range<GenomeKey>) {
        for key in keys {
            assert!(archive.admit_candidate(&Genome::new(key, ()), f64::INFINITY));
        }
    }

    #[test]
    fn admission_is_strictly_above_threshold() {
        let mut archive = NoveltyArchive::new(2.0, 0.0);
        assert!(!archive.admit_candidate(&Genome::new(0, ()), 2.0));
        assert!(archive.admit_candidate(&Genome::new(0, ()), 2.0 + 1e-9));
    }

    #[test]
    fn commit_moves_staged() {
        let mut archive = NoveltyArchive::new(1.0, 0.0);
        stage(&mut archive, 0..3);
        assert_eq!(archive.commit(), 3);
        assert!(archive.staged().is_empty());
        assert_eq!(archive.len(), 3);
        assert!(archive.contains(2));
        assert_eq!(archive.stagnation(), 0);
    }

    #[test]
    fn five_empty_generations_shrink_once() {
        let mut archive = NoveltyArchive::<()>::new(6.0, 0.001);
        for generation in 1..=5 {
            let admitted = archive.commit();
            archive.adapt_threshold(admitted);
            if generation < 5 {
                assert_eq!(archive.threshold(), 6.0);
                assert_eq!(archive.stagnation(), generation);
            }
        }
        assert!((archive.threshold() - 5.7).abs() < 1e-12);
        assert_eq!(archive.stagnation(), 0);
    }

    #[test]
    fn admission_resets_stagnation() {
        let mut archive = NoveltyArchive::new(6.0, 0.001);
        for _ in 0..4 {
            let admitted = archive.commit();
            archive.adapt_threshold(admitted);
        }
        assert_eq!(archive.stagnation(), 4);
        stage(&mut archive, 0..1);
        let admitted = archive.commit();
        archive.adapt_threshold(admitted);
        assert_eq!(archive.stagnation(), 0);
        assert_eq!(archive.threshold(), 6.0);
    }

    #[test]
    fn growth_after_four_admissions() {
        let mut archive = NoveltyArchive::new(1.0, 0.0);
        stage(&mut archive, 0..4);
        let admitted = archive.commit();
        archive.adapt_threshold(admitted);
        assert!((archive.threshold() - 1.2).abs() < 1e-12);

        stage(&mut archive, 4..7);
        let admitted = archive.commit();
        archive.adapt_threshold(admitted);
        assert!((archive.threshold() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn growth_regardless_of_stagnation() {
        let mut archive = NoveltyArchive::<()>::restore(
            SearchState {
                archive: GenomeMap::new(),
                threshold: 1.0,
                stagnation: STAGNATION_LIMIT,
            },
            0.0,
        );
        // Both adjustments apply: the shrink sees the stored counter,
        // the growth sees the admission count.
        archive.adapt_threshold(GROWTH_ADMISSIONS);
        assert!((archive.threshold() - 0.95 * 1.2).abs() < 1e-12);
        assert_eq!(archive.stagnation(), 0);
    }

    #[test]
    fn restage_existing_key_overwrites() {
        let mut archive = NoveltyArchive::new(0.0, 0.0);
        let mut genome = Genome::new(9, ());
        genome.set_reward(1.0);
        archive.admit_candidate(&genome, 1.0);
        archive.commit();
        genome.set_reward(2.0);
        archive.admit_candidate(&genome, 1.0);
        archive.commit();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.get(9).and_then(Genome::reward), Some(2.0));
    }

    proptest! {
        #[test]
        fn threshold_never_below_floor(
            init in 0.001f64..100.0,
            floor in 0.0f64..10.0,
            generations in 5usize..400,
        ) {
            let mut archive = NoveltyArchive::<()>::new(init.max(floor), floor);
            for _ in 0..generations {
                let admitted = archive.commit();
                archive.adapt_threshold(admitted);
                prop_assert!(archive.threshold() >= floor);
            }
        }

        #[test]
        fn archive_only_grows(batches in prop::collection::vec(0usize..6, 1..20)) {
            let mut archive = NoveltyArchive::new(1.0, 0.1);
            let mut next: GenomeKey = 0;
            let mut previous: Vec<GenomeKey> = Vec::new();
            for batch in batches {
                for _ in 0..batch {
                    archive.admit_candidate(&Genome::new(next, ()), f64::INFINITY);
                    next += 1;
                }
                let admitted = archive.commit();
                archive.adapt_threshold(admitted);
                prop_assert!(previous.iter().all(|k| archive.contains(*k)));
                previous = archive.genomes().keys().copied().collect();
            }
        }
    }
}
