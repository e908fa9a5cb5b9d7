use std::fmt;

use eqset_error::{OptionExt, Result};
use tracing::debug;

use super::builder::EqualSetBuilder;
use super::immutable::ImmutableEqualSet;
use crate::column_ref::ColumnRef;
use crate::config::EqualSetConfig;

/// An equality condition between two columns, e.g. from `a.x = b.y` in a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EqualityCondition {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl EqualityCondition {
    pub fn new(left: impl Into<ColumnRef>, right: impl Into<ColumnRef>) -> Self {
        EqualityCondition {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create a condition from column references that may have failed to
    /// resolve during binding.
    ///
    /// Errors if either side is missing, since registering a placeholder
    /// would make unrelated columns look equal.
    pub fn try_new(left: Option<ColumnRef>, right: Option<ColumnRef>) -> Result<Self> {
        Ok(EqualityCondition {
            left: left.required("left column of equality condition")?,
            right: right.required("right column of equality condition")?,
        })
    }
}

impl fmt::Display for EqualityCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

/// Register every condition as an equal pair.
pub fn collect_equalities<I>(conditions: I) -> EqualSetBuilder<ColumnRef>
where
    I: IntoIterator<Item = EqualityCondition>,
{
    conditions
        .into_iter()
        .map(|cond| (cond.left, cond.right))
        .collect()
}

/// Collect equalities from conditions, narrow them to the columns still
/// referenced, and build.
pub fn pruned_equalities<I, R>(
    conditions: I,
    referenced: R,
    config: &EqualSetConfig,
) -> Result<ImmutableEqualSet<ColumnRef>>
where
    I: IntoIterator<Item = EqualityCondition>,
    R: IntoIterator<Item = ColumnRef>,
{
    let mut builder = collect_equalities(conditions);
    if config.enable_narrowing {
        builder.remove_not_contain_checked(referenced, config)?;
    } else {
        debug!("skipping equal set narrowing");
    }

    Ok(builder.build())
}

/// Format the groups of an equal set for explain output, ordered according to
/// the config.
pub fn explain_equalities(set: &ImmutableEqualSet<ColumnRef>, config: &EqualSetConfig) -> String {
    set.display_in_order(config.group_order).to_string()
}
