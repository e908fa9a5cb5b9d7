use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use eqset_error::{DbError, Result, ResultExt};
use serde::Deserialize;

/// Prefix for environment variables overriding settings.
pub const ENV_PREFIX: &str = "EQSET_";

/// Configuration for how planner passes use equal sets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EqualSetConfig {
    /// Narrow equal sets down to referenced columns after pruning.
    pub enable_narrowing: bool,
    /// Check that narrowing didn't change any equality answer for the
    /// retained elements. Quadratic in the retained set.
    pub verify_narrowing: bool,
    /// Order used when listing the groups of an equal set.
    pub group_order: GroupOrder,
}

impl Default for EqualSetConfig {
    fn default() -> Self {
        EqualSetConfig {
            enable_narrowing: true,
            verify_narrowing: cfg!(debug_assertions),
            group_order: GroupOrder::FirstSeen,
        }
    }
}

/// How groups of an equal set are ordered when listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Groups ordered by their first seen member, members in first seen order.
    #[default]
    FirstSeen,
    /// Members sorted, groups sorted by their smallest member.
    Sorted,
}

impl GroupOrder {
    pub fn from_str_value(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first_seen" => Ok(GroupOrder::FirstSeen),
            "sorted" => Ok(GroupOrder::Sorted),
            other => Err(DbError::new(format!("Invalid group order: '{other}'"))
                .with_field("expected", "first_seen, sorted")),
        }
    }
}

impl fmt::Display for GroupOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstSeen => write!(f, "first_seen"),
            Self::Sorted => write!(f, "sorted"),
        }
    }
}

impl EqualSetConfig {
    /// Create a config from the defaults overridden by `EQSET_*` environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Create a config from defaults overridden by the given variables.
    ///
    /// Only variables starting with `EQSET_` are considered. The remainder of
    /// the name is lowercased and must name a known setting.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut conf = Self::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            conf.set_from_str(&name.to_lowercase(), value.as_ref())?;
        }
        Ok(conf)
    }

    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = SETTING_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = SETTING_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::new(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    /// Reset a single setting to its default.
    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let val = def_conf.get_as_string(name)?;
        self.set_from_str(name, &val)
    }

    /// Names and descriptions of all settings, sorted by name.
    pub fn settings() -> Vec<(&'static str, &'static str)> {
        let mut settings: Vec<_> = SETTING_FUNCTIONS
            .iter()
            .map(|(name, func)| (*name, func.description))
            .collect();
        settings.sort_unstable();
        settings
    }
}

struct SettingFunctions {
    description: &'static str,
    set: fn(value: &str, conf: &mut EqualSetConfig) -> Result<()>,
    get: fn(conf: &EqualSetConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: EqualSetSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: EqualSetSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static SETTING_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();

        insert_setting::<EnableNarrowing>(&mut map);
        insert_setting::<VerifyNarrowing>(&mut map);
        insert_setting::<GroupOrderSetting>(&mut map);

        map
    });

pub trait EqualSetSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut EqualSetConfig) -> Result<()>;
    fn get_as_string(conf: &EqualSetConfig) -> String;
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        other => other
            .parse::<bool>()
            .context_fn(|| format!("Invalid value for setting '{name}'")),
    }
}

pub struct EnableNarrowing;

impl EqualSetSetting for EnableNarrowing {
    const NAME: &'static str = "enable_narrowing";
    const DESCRIPTION: &'static str =
        "Narrow equal sets to the columns still referenced after pruning.";

    fn set_from_str(value: &str, conf: &mut EqualSetConfig) -> Result<()> {
        conf.enable_narrowing = parse_bool(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &EqualSetConfig) -> String {
        conf.enable_narrowing.to_string()
    }
}

pub struct VerifyNarrowing;

impl EqualSetSetting for VerifyNarrowing {
    const NAME: &'static str = "verify_narrowing";
    const DESCRIPTION: &'static str =
        "Verify that narrowing an equal set preserves equality between retained elements.";

    fn set_from_str(value: &str, conf: &mut EqualSetConfig) -> Result<()> {
        conf.verify_narrowing = parse_bool(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &EqualSetConfig) -> String {
        conf.verify_narrowing.to_string()
    }
}

pub struct GroupOrderSetting;

impl EqualSetSetting for GroupOrderSetting {
    const NAME: &'static str = "group_order";
    const DESCRIPTION: &'static str =
        "Order of groups when listing equal sets ('first_seen' or 'sorted').";

    fn set_from_str(value: &str, conf: &mut EqualSetConfig) -> Result<()> {
        conf.group_order = GroupOrder::from_str_value(value)?;
        Ok(())
    }

    fn get_as_string(conf: &EqualSetConfig) -> String {
        conf.group_order.to_string()
    }
}
