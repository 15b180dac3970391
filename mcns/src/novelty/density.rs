use std::num::NonZeroUsize;

/// Returns the k-nearest-neighbor density of a set of distances:
/// the sum of the `k` smallest distances divided by the number
/// of distances in the whole set.
///
/// An empty set has no neighbors to compare against, and is
/// given infinite density (maximal novelty). If the set holds
/// fewer than `k` distances, all of them are summed.
///
/// # Examples
/// ```
/// use mcns::novelty::density;
/// use std::num::NonZeroUsize;
///
/// let k = NonZeroUsize::new(2).unwrap();
/// assert_eq!(density(vec![4.0, 1.0, 3.0, 2.0], k), (1.0 + 2.0) / 4.0);
/// assert_eq!(density(vec![], k), f64::INFINITY);
/// ```
pub fn density(mut distances: Vec<f64>, k: NonZeroUsize) -> f64 {
    if distances.is_empty() {
        return f64::INFINITY;
    }
    distances.sort_unstable_by(f64::total_cmp);
    let nearest = k.get().min(distances.len());
    distances[..nearest].iter().sum::<f64>() / distances.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn k(k: usize) -> NonZeroUsize {
        NonZeroUsize::new(k).unwrap()
    }

    #[test]
    fn divides_by_whole_set() {
        assert_eq!(density(vec![2.0, 10.0, 6.0, 8.0], k(1)), 2.0 / 4.0);
        assert_eq!(density(vec![2.0, 10.0, 6.0, 8.0], k(3)), 16.0 / 4.0);
    }

    #[test]
    fn k_larger_than_set() {
        assert_eq!(density(vec![3.0, 1.0], k(10)), 4.0 / 2.0);
    }

    #[test]
    fn zero_distances() {
        assert_eq!(density(vec![0.0, 0.0, 0.0], k(2)), 0.0);
    }

    proptest! {
        #[test]
        fn empty_set_is_infinitely_novel(k in 1usize..64) {
            prop_assert_eq!(density(Vec::new(), NonZeroUsize::new(k).unwrap()), f64::INFINITY);
        }

        #[test]
        fn density_grows_with_k(distances in prop::collection::vec(0.0f64..1e6, 1..50)) {
            let mut previous = 0.0;
            for i in 1..=distances.len() {
                let current = density(distances.clone(), NonZeroUsize::new(i).unwrap());
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
