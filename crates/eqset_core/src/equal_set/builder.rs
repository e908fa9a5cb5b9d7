use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use eqset_error::{Result, internal};
use tracing::{debug, trace};

use super::immutable::ImmutableEqualSet;
use super::{ElementSet, ParentMap, find_root};
use crate::config::EqualSetConfig;

/// Mutable union-find used to accumulate equalities before freezing them into
/// an [`ImmutableEqualSet`].
///
/// Single writer. Building copies the current state so the builder can keep
/// being modified without affecting previously built sets.
#[derive(Debug, Clone)]
pub struct EqualSetBuilder<T> {
    /// One hop towards the root of each element's class. Roots have no entry.
    parent: ParentMap<T>,
    /// Every element seen so far, in the order it was first seen.
    elements: ElementSet<T>,
}

impl<T> Default for EqualSetBuilder<T> {
    fn default() -> Self {
        EqualSetBuilder {
            parent: ParentMap::default(),
            elements: ElementSet::default(),
        }
    }
}

impl<T> EqualSetBuilder<T>
where
    T: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Record that `a` and `b` are equal.
    ///
    /// When `a` and `b` are in different classes, the root of `b`'s class is
    /// placed under the root of `a`'s class. Adding an element to itself just
    /// registers it as known.
    pub fn add_equal_pair(&mut self, a: T, b: T) -> &mut Self {
        let root_a = self.root(&a);
        let root_b = self.root(&b);

        self.elements.insert(a);
        self.elements.insert(b);

        if root_a != root_b {
            trace!(?root_a, ?root_b, "merging equal set classes");
            // Both are roots, so this can't introduce a cycle.
            self.parent.insert(root_b, root_a);
        }

        self
    }

    /// Add all classes from an existing set.
    pub fn add_equal_set(&mut self, other: &ImmutableEqualSet<T>) -> &mut Self {
        for group in other.group_refs() {
            self.add_group(group.into_iter().cloned());
        }
        self
    }

    /// Register all elements in `members` as equal to each other.
    fn add_group(&mut self, members: impl IntoIterator<Item = T>) {
        let mut members = members.into_iter();
        let Some(first) = members.next() else {
            return;
        };

        self.add_equal_pair(first.clone(), first.clone());
        for member in members {
            self.add_equal_pair(first.clone(), member);
        }
    }

    /// Get the root for an element, pointing every element on the way
    /// directly at the root.
    ///
    /// Elements we don't know about are their own root.
    pub fn root(&mut self, item: &T) -> T {
        let root = find_root(&self.parent, item).clone();

        let mut current = item.clone();
        while current != root {
            match self.parent.get_mut(&current) {
                Some(parent) => current = std::mem::replace(parent, root.clone()),
                None => break,
            }
        }

        root
    }

    /// Check if two elements are equal without modifying the forest.
    pub fn is_equal(&self, a: &T, b: &T) -> bool {
        find_root(&self.parent, a) == find_root(&self.parent, b)
    }

    /// Keep only elements in `retain`.
    ///
    /// Every retained element is resolved to its root using the full forest,
    /// and the forest is rebuilt with only retained elements as keys, each
    /// pointing directly at that root. Equality between retained elements is
    /// unchanged even if every element connecting them was removed.
    ///
    /// Removed elements are forgotten. If one is added again later it starts
    /// out in its own class, unless it's still the root of a retained
    /// element's class.
    pub fn remove_not_contain<I>(&mut self, retain: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let retain: hashbrown::HashSet<T> = retain
            .into_iter()
            .map(|item| item.borrow().clone())
            .collect();

        let mut parent = ParentMap::with_capacity(retain.len());
        for item in &retain {
            let root = self.root(item);
            if &root != item {
                parent.insert(item.clone(), root);
            }
        }

        let before = self.elements.len();
        self.parent = parent;
        self.elements.retain(|item| retain.contains(item));

        debug!(
            retained = self.elements.len(),
            removed = before - self.elements.len(),
            "narrowed equal set"
        );

        self
    }

    /// Same as `remove_not_contain`, but verifies afterwards that every pair
    /// of retained elements is still answered the same way if the config asks
    /// for it.
    pub fn remove_not_contain_checked<I>(
        &mut self,
        retain: I,
        config: &EqualSetConfig,
    ) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: Borrow<T>,
    {
        let retain: Vec<T> = retain
            .into_iter()
            .map(|item| item.borrow().clone())
            .collect();

        if !config.verify_narrowing {
            return Ok(self.remove_not_contain(&retain));
        }

        let before = self.build();
        self.remove_not_contain(&retain);
        self.verify_matches(&before, &retain)?;

        Ok(self)
    }

    /// Check that every pair in `items` is answered the same way by this
    /// builder and by `before`.
    fn verify_matches(&self, before: &ImmutableEqualSet<T>, items: &[T]) -> Result<()> {
        for (idx, a) in items.iter().enumerate() {
            for b in &items[idx + 1..] {
                let expected = before.is_equal(a, b);
                let got = self.is_equal(a, b);
                if expected != got {
                    return Err(internal!("Narrowing changed equality between retained elements")
                        .with_field("left", format!("{a:?}"))
                        .with_field("right", format!("{b:?}"))
                        .with_field("expected", expected)
                        .with_field("got", got));
                }
            }
        }
        Ok(())
    }

    /// Rename elements using `replace_map`, keeping classes intact.
    ///
    /// Elements missing from the map keep their name. Classes are merged if
    /// elements from different classes get renamed to the same element.
    pub fn replace<S>(&mut self, replace_map: &HashMap<T, T, S>) -> &mut Self
    where
        S: BuildHasher,
    {
        let current = self.build();

        let mut replaced = Self::new();
        for group in current.group_refs() {
            replaced.add_group(
                group
                    .into_iter()
                    .map(|item| replace_map.get(item).unwrap_or(item).clone()),
            );
        }

        *self = replaced;
        self
    }

    /// Freeze the current state into an immutable set.
    ///
    /// The parent map is copied and flattened so that every element resolves
    /// to its root in one lookup.
    pub fn build(&self) -> ImmutableEqualSet<T> {
        let mut flat: ParentMap<T> = ParentMap::with_capacity(self.parent.len());
        let mut path: Vec<&T> = Vec::new();

        for key in self.parent.keys() {
            if flat.contains_key(key) {
                continue;
            }

            let mut current = key;
            let root = loop {
                if let Some(root) = flat.get(current) {
                    break root.clone();
                }
                match self.parent.get(current) {
                    Some(next) => {
                        path.push(current);
                        current = next;
                    }
                    None => break current.clone(),
                }
            };

            for item in path.drain(..) {
                flat.insert(item.clone(), root.clone());
            }
        }

        trace!(
            elements = self.elements.len(),
            entries = flat.len(),
            "built equal set"
        );

        ImmutableEqualSet::new(flat, self.elements.clone())
    }
}

impl<T> From<&ImmutableEqualSet<T>> for EqualSetBuilder<T>
where
    T: Eq + Hash + Clone,
{
    fn from(set: &ImmutableEqualSet<T>) -> Self {
        let (parent, elements) = set.parts();
        EqualSetBuilder {
            parent: parent.clone(),
            elements: elements.clone(),
        }
    }
}

impl<T> Extend<(T, T)> for EqualSetBuilder<T>
where
    T: Eq + Hash + Clone + fmt::Debug,
{
    fn extend<I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) {
        for (a, b) in iter {
            self.add_equal_pair(a, b);
        }
    }
}

impl<T> FromIterator<(T, T)> for EqualSetBuilder<T>
where
    T: Eq + Hash + Clone + fmt::Debug,
{
    fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
        let mut builder = Self::new();
        builder.extend(iter);
        builder
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use eqset_error::ErrorKind;

    use super::*;

    #[test]
    fn first_argument_root_survives() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2).add_equal_pair(3, 4);
        assert_eq!(1, builder.root(&2));
        assert_eq!(3, builder.root(&4));

        builder.add_equal_pair(4, 2);
        assert_eq!(3, builder.root(&1));
        assert_eq!(3, builder.root(&2));
    }

    #[test]
    fn root_compresses_path() {
        let mut builder = EqualSetBuilder::new();
        // 0 -> 1 -> 2 -> 3
        builder
            .add_equal_pair(1, 0)
            .add_equal_pair(2, 1)
            .add_equal_pair(3, 2);

        assert_eq!(Some(&1), builder.parent.get(&0));

        assert_eq!(3, builder.root(&0));
        assert_eq!(Some(&3), builder.parent.get(&0));
        assert_eq!(Some(&3), builder.parent.get(&1));
        assert_eq!(Some(&3), builder.parent.get(&2));
        assert_eq!(None, builder.parent.get(&3));
    }

    #[test]
    fn unknown_element_is_own_root() {
        let mut builder = EqualSetBuilder::<i32>::new();
        assert_eq!(99, builder.root(&99));
        // Looking up doesn't register.
        assert!(builder.is_empty());
    }

    #[test]
    fn readding_pair_is_noop() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2).add_equal_pair(2, 3);
        let before = builder.build();

        builder.add_equal_pair(3, 1).add_equal_pair(1, 2);
        let after = builder.build();

        assert_eq!(before.groups(), after.groups());
        assert_eq!(3, builder.len());
    }

    #[test]
    fn self_pair_registers_element() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(5, 5);

        assert_eq!(1, builder.len());
        assert!(builder.parent.is_empty());
    }

    #[test]
    fn narrowing_keeps_only_retained_keys() {
        let mut builder = EqualSetBuilder::new();
        builder
            .add_equal_pair(1, 2)
            .add_equal_pair(2, 3)
            .add_equal_pair(3, 4);
        builder.remove_not_contain([2, 4]);

        assert_eq!(2, builder.len());
        assert!(builder.parent.keys().all(|k| *k == 2 || *k == 4));
        assert!(builder.is_equal(&2, &4));
    }

    #[test]
    fn narrowing_to_removed_root() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2).add_equal_pair(1, 3);
        // 1 is the root, but isn't retained.
        builder.remove_not_contain(&[2, 3]);

        assert!(builder.is_equal(&2, &3));
        assert!(!builder.is_equal(&2, &4));

        // The removed root still names the class.
        builder.add_equal_pair(1, 4);
        assert!(builder.is_equal(&2, &4));
    }

    #[test]
    fn removed_non_root_is_forgotten() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2).add_equal_pair(1, 3);
        builder.remove_not_contain([1, 3]);

        assert!(!builder.is_equal(&2, &1));
        builder.add_equal_pair(2, 9);
        assert!(!builder.is_equal(&9, &1));
        assert!(builder.is_equal(&1, &3));
    }

    #[test]
    fn narrowing_with_unknown_retained() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2);
        builder.remove_not_contain([1, 7]);

        assert_eq!(1, builder.len());
        assert!(!builder.is_equal(&1, &7));
        assert!(builder.is_equal(&7, &7));
    }

    #[test]
    fn checked_narrowing_passes() {
        let config = EqualSetConfig {
            enable_narrowing: true,
            verify_narrowing: true,
            ..Default::default()
        };

        let mut builder: EqualSetBuilder<_> = [(1, 2), (2, 3), (3, 4), (5, 6)].into_iter().collect();
        builder.remove_not_contain_checked([1, 4, 6], &config).unwrap();

        assert!(builder.is_equal(&1, &4));
        assert!(!builder.is_equal(&1, &6));
    }

    #[test]
    fn verify_reports_changed_answer() {
        let mut builder: EqualSetBuilder<_> = [(1, 2), (2, 3)].into_iter().collect();
        builder.remove_not_contain([1, 3]);
        let before = builder.build();
        builder.verify_matches(&before, &[1, 3]).unwrap();

        // Drop the entry linking 3 to its class.
        builder.parent.remove(&3);

        let err = builder.verify_matches(&before, &[1, 3]).unwrap_err();
        assert_eq!(ErrorKind::Internal, err.kind());
        assert_eq!(
            "Narrowing changed equality between retained elements",
            err.get_msg()
        );
        assert_eq!(Some("1"), err.get_field("left"));
        assert_eq!(Some("3"), err.get_field("right"));
        assert_eq!(Some("true"), err.get_field("expected"));
        assert_eq!(Some("false"), err.get_field("got"));
    }

    #[test]
    fn checked_narrowing_without_verify() {
        let config = EqualSetConfig {
            enable_narrowing: true,
            verify_narrowing: false,
            ..Default::default()
        };

        let mut builder: EqualSetBuilder<_> = [(1, 2), (2, 3)].into_iter().collect();
        builder.remove_not_contain_checked([1, 3], &config).unwrap();

        assert_eq!(2, builder.len());
        assert!(builder.is_equal(&1, &3));
    }

    #[test]
    fn build_is_a_copy() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2);
        let set = builder.build();

        builder.add_equal_pair(2, 3);
        builder.remove_not_contain([3]);

        assert!(set.is_equal(&1, &2));
        assert!(!set.is_equal(&1, &3));
        assert_eq!(vec![vec![1, 2]], set.groups());
    }

    #[test]
    fn replace_renames_and_merges() {
        let mut builder = EqualSetBuilder::new();
        builder.add_equal_pair(1, 2).add_equal_pair(3, 4);

        let map: HashMap<_, _> = [(2, 20), (4, 20)].into_iter().collect();
        builder.replace(&map);

        assert!(builder.is_equal(&1, &20));
        assert!(builder.is_equal(&3, &20));
        assert!(builder.is_equal(&1, &3));
        assert!(!builder.is_equal(&1, &2));
        assert_eq!(3, builder.len());
    }

    #[test]
    fn add_equal_set_merges_classes() {
        let left = EqualSetBuilder::from_iter([(1, 2)]).build();
        let right = EqualSetBuilder::from_iter([(2, 3), (8, 9)]).build();

        let mut builder = EqualSetBuilder::from(&left);
        builder.add_equal_set(&right);
        let set = builder.build();

        assert!(set.is_equal(&1, &3));
        assert!(set.is_equal(&8, &9));
        assert!(!set.is_equal(&1, &8));

        let all: HashSet<_> = set.all_items().copied().collect();
        assert_eq!(HashSet::from([1, 2, 3, 8, 9]), all);
    }
}
