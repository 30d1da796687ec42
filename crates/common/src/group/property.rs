use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::GroupResource;

/// What a request does to the properties it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Delete,
    Replace,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add => write!(f, "add"),
            Operation::Delete => write!(f, "delete"),
            Operation::Replace => write!(f, "replace"),
        }
    }
}

/// Names of group properties, as used on the wire and by the policy checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKey {
    #[serde(rename = "gname")]
    Name,
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "members")]
    Members,
    #[serde(rename = "masters")]
    Masters,
    #[serde(rename = "devices")]
    Devices,
    #[serde(rename = "resources")]
    Resources,
    #[serde(rename = "subgroups")]
    Subgroups,
    /// The group record as a whole.
    #[serde(rename = "group")]
    Group,
}

impl PropertyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::Name => "gname",
            PropertyKey::Owner => "owner",
            PropertyKey::Members => "members",
            PropertyKey::Masters => "masters",
            PropertyKey::Devices => "devices",
            PropertyKey::Resources => "resources",
            PropertyKey::Subgroups => "subgroups",
            PropertyKey::Group => "group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gname" => Some(PropertyKey::Name),
            "owner" => Some(PropertyKey::Owner),
            "members" => Some(PropertyKey::Members),
            "masters" => Some(PropertyKey::Masters),
            "devices" => Some(PropertyKey::Devices),
            "resources" => Some(PropertyKey::Resources),
            "subgroups" => Some(PropertyKey::Subgroups),
            "group" => Some(PropertyKey::Group),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list-valued group property together with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Members(BTreeSet<String>),
    Masters(BTreeSet<String>),
    Devices(BTreeSet<String>),
    Resources(Vec<GroupResource>),
}

impl Property {
    pub fn key(&self) -> PropertyKey {
        match self {
            Property::Members(_) => PropertyKey::Members,
            Property::Masters(_) => PropertyKey::Masters,
            Property::Devices(_) => PropertyKey::Devices,
            Property::Resources(_) => PropertyKey::Resources,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Property::Members(values) | Property::Masters(values) | Property::Devices(values) => {
                values.is_empty()
            }
            Property::Resources(values) => values.is_empty(),
        }
    }

    /// The id-valued entries of this property; empty for resources.
    pub fn ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Property::Members(values) | Property::Masters(values) | Property::Devices(values) => {
                Some(values)
            }
            Property::Resources(_) => None,
        }
    }
}

/// A single-valued group property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Name(String),
    Owner(String),
}

impl Replacement {
    pub fn key(&self) -> PropertyKey {
        match self {
            Replacement::Name(_) => PropertyKey::Name,
            Replacement::Owner(_) => PropertyKey::Owner,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Replacement::Name(value) | Replacement::Owner(value) => value,
        }
    }
}

/// The properties named by one group-management request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyUpdate {
    pub replacements: Vec<Replacement>,
    pub properties: Vec<Property>,
}

impl PropertyUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_replacement(mut self, replacement: Replacement) -> Self {
        self.replacements.push(replacement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.properties.is_empty()
    }

    /// Every property key touched, replacements first.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.replacements
            .iter()
            .map(Replacement::key)
            .chain(self.properties.iter().map(Property::key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip_wire_names() {
        for key in [
            PropertyKey::Name,
            PropertyKey::Owner,
            PropertyKey::Members,
            PropertyKey::Masters,
            PropertyKey::Devices,
            PropertyKey::Resources,
            PropertyKey::Subgroups,
            PropertyKey::Group,
        ] {
            assert_eq!(PropertyKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(PropertyKey::parse("NOT_SUPPORTED_PROPERTY"), None);
    }

    #[test]
    fn test_update_keys() {
        let update = PropertyUpdate::new()
            .with(Property::Members(BTreeSet::from(["u2".to_string()])))
            .with_replacement(Replacement::Name("mypark".to_string()));
        assert_eq!(update.keys(), vec![PropertyKey::Name, PropertyKey::Members]);
    }
}
