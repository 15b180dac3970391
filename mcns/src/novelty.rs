//! Novelty scoring. Genomes that clear the minimal criterion
//! are scored by how far their behavior lies from that of their
//! nearest neighbors in the current population and in an archive
//! of behaviors that were novel when first seen.
mod archive;
mod density;
mod metric;
mod scorer;

pub use archive::{NoveltyArchive, SearchState};
pub use density::density;
pub use metric::Metric;
pub use scorer::{GenerationScorer, NoveltySummary};
