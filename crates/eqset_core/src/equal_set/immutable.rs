use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use indexmap::IndexMap;

use super::builder::EqualSetBuilder;
use super::{ElementSet, ParentMap};
use crate::config::GroupOrder;

/// Frozen set of equalities.
///
/// Every element in the parent map points directly at its root, so lookups
/// are a single hash lookup. There's no interior mutability, and sets can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct ImmutableEqualSet<T> {
    parent: ParentMap<T>,
    elements: ElementSet<T>,
}

impl<T> Default for ImmutableEqualSet<T> {
    fn default() -> Self {
        ImmutableEqualSet {
            parent: ParentMap::default(),
            elements: ElementSet::default(),
        }
    }
}

impl<T> ImmutableEqualSet<T>
where
    T: Eq + Hash + Clone,
{
    /// Only called by the builder with an already flattened map.
    pub(crate) fn new(parent: ParentMap<T>, elements: ElementSet<T>) -> Self {
        ImmutableEqualSet { parent, elements }
    }

    pub(crate) fn parts(&self) -> (&ParentMap<T>, &ElementSet<T>) {
        (&self.parent, &self.elements)
    }

    /// An equal set where every element is only equal to itself.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of known elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn root_of<'a>(&'a self, item: &'a T) -> &'a T {
        self.parent.get(item).unwrap_or(item)
    }

    /// Check if two elements are equal.
    ///
    /// Elements never seen are only equal to themselves.
    pub fn is_equal(&self, a: &T, b: &T) -> bool {
        self.root_of(a) == self.root_of(b)
    }

    /// All known elements, in the order they were first seen.
    pub fn all_items(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    /// Get every known element equal to `item`, including `item` itself.
    ///
    /// `item` is always first, followed by the rest in first seen order.
    pub fn equal_set_of(&self, item: &T) -> Vec<T> {
        let root = self.root_of(item);

        let mut out = vec![item.clone()];
        out.extend(
            self.elements
                .iter()
                .filter(|elem| *elem != item && self.root_of(elem) == root)
                .cloned(),
        );
        out
    }

    /// Group known elements by class.
    ///
    /// Groups are ordered by their first seen member, and members within a
    /// group are in first seen order. Classes with only a single known member
    /// are included.
    pub fn groups(&self) -> Vec<Vec<T>> {
        self.group_refs()
            .into_iter()
            .map(|group| group.into_iter().cloned().collect())
            .collect()
    }

    pub(crate) fn group_refs(&self) -> Vec<Vec<&T>> {
        let mut groups: IndexMap<&T, Vec<&T>, ahash::RandomState> = IndexMap::default();
        for item in &self.elements {
            groups.entry(self.root_of(item)).or_default().push(item);
        }
        groups.into_values().collect()
    }

    /// Create a new builder starting with the equalities in this set.
    pub fn to_builder(&self) -> EqualSetBuilder<T>
    where
        T: fmt::Debug,
    {
        EqualSetBuilder::from(self)
    }

    /// Rename elements, returning a new set. See [`EqualSetBuilder::replace`].
    pub fn replace<S>(&self, replace_map: &HashMap<T, T, S>) -> Self
    where
        T: fmt::Debug,
        S: BuildHasher,
    {
        let mut builder = self.to_builder();
        builder.replace(replace_map);
        builder.build()
    }
}

impl<T> ImmutableEqualSet<T>
where
    T: Eq + Hash + Clone + Ord,
{
    /// Groups with members sorted, and groups sorted by their smallest member.
    pub fn sorted_groups(&self) -> Vec<Vec<T>> {
        let mut groups = self.groups();
        for group in &mut groups {
            group.sort_unstable();
        }
        groups.sort_unstable();
        groups
    }

    pub fn groups_in_order(&self, order: GroupOrder) -> Vec<Vec<T>> {
        match order {
            GroupOrder::FirstSeen => self.groups(),
            GroupOrder::Sorted => self.sorted_groups(),
        }
    }

    /// Display the groups using the given order.
    pub fn display_in_order(&self, order: GroupOrder) -> DisplayGroups<'_, T> {
        DisplayGroups { set: self, order }
    }
}

fn fmt_groups<'a, T>(
    groups: impl IntoIterator<Item = impl IntoIterator<Item = &'a T>>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result
where
    T: fmt::Display + 'a,
{
    for (idx, group) in groups.into_iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{{")?;
        for (member_idx, member) in group.into_iter().enumerate() {
            if member_idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "}}")?;
    }
    Ok(())
}

/// Groups are listed in first seen order.
impl<T> fmt::Display for ImmutableEqualSet<T>
where
    T: Eq + Hash + Clone + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_groups(self.group_refs(), f)
    }
}

/// Displays an equal set with a configured group order.
#[derive(Debug)]
pub struct DisplayGroups<'a, T> {
    set: &'a ImmutableEqualSet<T>,
    order: GroupOrder,
}

impl<T> fmt::Display for DisplayGroups<'_, T>
where
    T: Eq + Hash + Clone + Ord + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_groups(&self.set.groups_in_order(self.order), f)
    }
}
