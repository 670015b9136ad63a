//! Event-level experiment records
//!
//! An [`Observation`] is one user event from a two-arm experiment. Records are
//! loaded once and never mutated; every analysis stage borrows them read-only.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Experiment arm a user was assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Control,
    Treatment,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Control, Group::Treatment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Control => "control",
            Group::Treatment => "treatment",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "control" => Ok(Group::Control),
            "treatment" => Ok(Group::Treatment),
            other => Err(format!("unknown group label '{}'", other)),
        }
    }
}

/// Page variant actually shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Old,
    New,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Old => "old",
            Variant::New => "new",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    /// Accepts both `old`/`new` and the `old_page`/`new_page` labels
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "old" | "old_page" => Ok(Variant::Old),
            "new" | "new_page" => Ok(Variant::New),
            other => Err(format!("unknown variant label '{}'", other)),
        }
    }
}

/// Declared valid (group, variant) pairs
///
/// # Example
/// ```
/// use veredicto::observation::{Group, GroupVariantMap, Variant};
///
/// let map = GroupVariantMap::default();
/// assert!(map.is_consistent(Group::Control, Variant::Old));
/// assert!(!map.is_consistent(Group::Control, Variant::New));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupVariantMap(BTreeMap<Group, Variant>);

impl Default for GroupVariantMap {
    fn default() -> Self {
        Self::new([(Group::Control, Variant::Old), (Group::Treatment, Variant::New)])
    }
}

impl GroupVariantMap {
    pub fn new(pairs: impl IntoIterator<Item = (Group, Variant)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Variant a group is expected to see, if the group is declared
    pub fn expected(&self, group: Group) -> Option<Variant> {
        self.0.get(&group).copied()
    }

    /// Whether `variant` is the declared variant for `group`
    ///
    /// Groups missing from the map have no valid pairing.
    pub fn is_consistent(&self, group: Group, variant: Variant) -> bool {
        self.expected(group) == Some(variant)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Group, Variant)> + '_ {
        self.0.iter().map(|(g, v)| (*g, *v))
    }
}

/// One user-event record
///
/// Only `id` is always present; every other field may be missing in the
/// loaded data and is counted by the integrity validator. An empty `id`
/// counts as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub timestamp: Option<NaiveDateTime>,
    pub group: Option<Group>,
    pub variant: Option<Variant>,
    pub converted: Option<bool>,
    pub segment: Option<String>,
}

impl Observation {
    /// Fully populated record, mostly useful for tests and generators
    pub fn new(id: impl Into<String>, group: Group, variant: Variant, converted: bool) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            group: Some(group),
            variant: Some(variant),
            converted: Some(converted),
            segment: None,
        }
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Whether the (group, variant) pair violates the declared mapping
    ///
    /// Records missing either label are not misassigned, they are missing.
    pub fn is_misassigned(&self, map: &GroupVariantMap) -> bool {
        match (self.group, self.variant) {
            (Some(group), Some(variant)) => !map.is_consistent(group, variant),
            _ => false,
        }
    }
}
