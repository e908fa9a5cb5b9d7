//! Equal sets track which elements (columns, expressions) are known to be
//! equal during planning.
//!
//! Equalities are accumulated in an [`EqualSetBuilder`] as they're discovered
//! (e.g. from equi-join conditions). The builder may then be narrowed down to
//! the elements that are still interesting to later passes, and finally
//! frozen into an [`ImmutableEqualSet`] that can be shared freely.
//!
//! Internally this is a union-find forest stored as a parent map. An element
//! without an entry in the map is the root of its class. Narrowing rewrites
//! the forest so that every retained element points directly at the root it
//! had before narrowing. Removed elements may still show up as roots, but
//! roots are only ever compared, never followed.

pub mod builder;
pub mod collect;
pub mod immutable;

use std::hash::Hash;

pub use builder::EqualSetBuilder;
pub use immutable::ImmutableEqualSet;

/// Parent map used by both the builder and the immutable set. Uses
/// hashbrown's default (ahash) hasher.
pub(crate) type ParentMap<T> = hashbrown::HashMap<T, T>;

/// Insertion ordered set of known elements.
pub(crate) type ElementSet<T> = indexmap::IndexSet<T, ahash::RandomState>;

/// Follow parent pointers until we hit an element without a parent.
///
/// Does not compress the path. Requires the parent map to be acyclic.
pub(crate) fn find_root<'a, T>(parent: &'a ParentMap<T>, item: &'a T) -> &'a T
where
    T: Eq + Hash,
{
    let mut current = item;
    while let Some(next) = parent.get(current) {
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// Brute force equivalence classes by repeatedly propagating the smallest
    /// label across all pairs until nothing changes.
    fn oracle_labels(num_elements: usize, pairs: &[(usize, usize)]) -> Vec<usize> {
        let mut labels: Vec<usize> = (0..num_elements).collect();
        loop {
            let mut changed = false;
            for &(a, b) in pairs {
                let min = labels[a].min(labels[b]);
                if labels[a] != min || labels[b] != min {
                    labels[a] = min;
                    labels[b] = min;
                    changed = true;
                }
            }
            if !changed {
                return labels;
            }
        }
    }

    fn random_pairs(rng: &mut ChaCha8Rng, num_elements: usize) -> Vec<(usize, usize)> {
        let num_pairs = rng.random_range(0..num_elements * 2);
        (0..num_pairs)
            .map(|_| {
                (
                    rng.random_range(0..num_elements),
                    rng.random_range(0..num_elements),
                )
            })
            .collect()
    }

    #[test]
    fn matches_oracle_without_narrowing() {
        logutil::init_test();

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let num_elements = rng.random_range(1..40);
            let pairs = random_pairs(&mut rng, num_elements);
            let labels = oracle_labels(num_elements, &pairs);

            let set = pairs.iter().copied().collect::<EqualSetBuilder<_>>().build();

            for a in 0..num_elements {
                assert!(set.is_equal(&a, &a));
                for b in 0..num_elements {
                    let expected = labels[a] == labels[b];
                    assert_eq!(expected, set.is_equal(&a, &b), "seed: {seed}, a: {a}, b: {b}");
                    assert_eq!(set.is_equal(&a, &b), set.is_equal(&b, &a));
                }
            }
        }
    }

    #[test]
    fn narrowing_preserves_equality() {
        logutil::init_test();

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let num_elements = rng.random_range(1..40);
            let pairs = random_pairs(&mut rng, num_elements);
            let labels = oracle_labels(num_elements, &pairs);

            let retain: HashSet<usize> = (0..num_elements)
                .filter(|_| rng.random_bool(0.4))
                .collect();
            // Second narrowing only keeps a subset of the first.
            let retain_again: HashSet<usize> = retain
                .iter()
                .copied()
                .filter(|_| rng.random_bool(0.7))
                .collect();

            let mut builder: EqualSetBuilder<_> = pairs.iter().copied().collect();
            builder.remove_not_contain(&retain);
            let once = builder.build();

            builder.remove_not_contain(&retain_again);
            let twice = builder.build();

            for &a in &retain {
                for &b in &retain {
                    let expected = labels[a] == labels[b];
                    assert_eq!(expected, once.is_equal(&a, &b), "seed: {seed}, a: {a}, b: {b}");
                }
            }

            for &a in &retain_again {
                for &b in &retain_again {
                    let expected = labels[a] == labels[b];
                    assert_eq!(expected, twice.is_equal(&a, &b), "seed: {seed}, a: {a}, b: {b}");
                }
            }
        }
    }

    #[test]
    fn long_chain_resolves_without_recursion() {
        let mut builder = EqualSetBuilder::new();
        for i in 0..100_000_u32 {
            // Each new element's root goes under the previous root, building a
            // deep chain before any compression happens on the far end.
            builder.add_equal_pair(i + 1, i);
        }

        let set = builder.build();
        assert!(set.is_equal(&0, &100_000));
    }
}
