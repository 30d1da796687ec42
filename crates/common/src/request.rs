//! Decoding group-management payloads into typed property updates.
//!
//! Payloads are JSON objects keyed by wire property names:
//!
//! ```json
//! {
//!   "gname": "mypark",
//!   "members": ["u2", "u3"],
//!   "resources": [
//!     { "href": "/di/d1/a/light/0", "rt": ["core.light"], "if": ["oic.if.baseline"] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::GroupError;
use crate::group::{GroupResource, Property, PropertyKey, PropertyUpdate, Replacement};

/// Wire shape of a property payload. Values stay untyped so each key can
/// report its own type error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyPayload {
    gname: Option<Value>,
    owner: Option<Value>,
    members: Option<Value>,
    masters: Option<Value>,
    devices: Option<Value>,
    resources: Option<Value>,
    subgroups: Option<Value>,
    group: Option<Value>,
}

impl PropertyUpdate {
    pub fn from_json(payload: &Value) -> Result<Self, GroupError> {
        if !payload.is_object() {
            return Err(GroupError::bad_request("payload must be an object"));
        }
        let payload = PropertyPayload::deserialize(payload)
            .map_err(|e| GroupError::bad_request(format!("unsupported property: {}", e)))?;

        for (key, value) in [
            (PropertyKey::Subgroups, &payload.subgroups),
            (PropertyKey::Group, &payload.group),
        ] {
            if value.is_some() {
                return Err(GroupError::bad_request(format!(
                    "{} cannot be set directly",
                    key
                )));
            }
        }

        let mut update = PropertyUpdate::new();
        if let Some(value) = &payload.gname {
            let name = single_string(PropertyKey::Name, value)?;
            update.replacements.push(Replacement::Name(name));
        }
        if let Some(value) = &payload.owner {
            let owner = single_string(PropertyKey::Owner, value)?;
            update.replacements.push(Replacement::Owner(owner));
        }
        if let Some(value) = &payload.members {
            let values = ids(PropertyKey::Members, value)?;
            update.properties.push(Property::Members(values));
        }
        if let Some(value) = &payload.masters {
            let values = ids(PropertyKey::Masters, value)?;
            update.properties.push(Property::Masters(values));
        }
        if let Some(value) = &payload.devices {
            let values = ids(PropertyKey::Devices, value)?;
            update.properties.push(Property::Devices(values));
        }
        if let Some(value) = &payload.resources {
            update.properties.push(Property::Resources(resources(value)?));
        }

        Ok(update)
    }

    pub fn from_json_str(payload: &str) -> Result<Self, GroupError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| GroupError::bad_request(format!("malformed payload: {}", e)))?;
        Self::from_json(&value)
    }
}

fn single_string(key: PropertyKey, value: &Value) -> Result<String, GroupError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| GroupError::bad_request(format!("{} must be a single string", key)))
}

fn ids(key: PropertyKey, value: &Value) -> Result<BTreeSet<String>, GroupError> {
    let Value::Array(items) = value else {
        return Err(GroupError::bad_request(format!("{} must be a list", key)));
    };
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                GroupError::bad_request(format!("{} values must be strings", key))
            })
        })
        .collect()
}

fn resources(value: &Value) -> Result<Vec<GroupResource>, GroupError> {
    let Value::Array(items) = value else {
        return Err(GroupError::bad_request("resources must be a list"));
    };
    items
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone())
                .map_err(|e| GroupError::bad_request(format!("malformed resource: {}", e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_full_update() {
        let update = PropertyUpdate::from_json(&json!({
            "gname": "mypark",
            "members": ["u1", "u2"],
            "resources": [{
                "href": "/di/d1/a/switch/1",
                "rt": ["core.switch"],
                "if": ["oic.if.baseline"]
            }]
        }))
        .unwrap();

        assert_eq!(update.replacements, vec![Replacement::Name("mypark".to_string())]);
        assert_eq!(
            update.properties,
            vec![
                Property::Members(BTreeSet::from(["u1".to_string(), "u2".to_string()])),
                Property::Resources(vec![GroupResource::new(
                    "/di/d1/a/switch/1",
                    ["core.switch"],
                    ["oic.if.baseline"]
                )]),
            ]
        );
    }

    #[test]
    fn test_unsupported_property() {
        let result = PropertyUpdate::from_json(&json!({ "NOT_SUPPORTED_PROPERTY": ["d1"] }));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));

        let result = PropertyUpdate::from_json(&json!({ "subgroups": ["g3"] }));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));
    }

    #[test]
    fn test_scalar_where_list_expected() {
        let result = PropertyUpdate::from_json(&json!({ "devices": "d1" }));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));

        let result = PropertyUpdate::from_json(&json!({ "gname": ["a", "b"] }));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));
    }

    #[test]
    fn test_resource_with_scalar_rt() {
        let result = PropertyUpdate::from_json(&json!({
            "resources": [{
                "href": "/di/d3/a/light/0",
                "rt": "core.light",
                "if": "oic.if.baseline"
            }]
        }));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));
    }

    #[test]
    fn test_properties_in_fixed_order() {
        let update = PropertyUpdate::from_json(&json!({
            "owner": "u2",
            "resources": [],
            "devices": ["d1"],
            "gname": "cabin"
        }))
        .unwrap();

        assert_eq!(
            update.keys(),
            vec![
                PropertyKey::Name,
                PropertyKey::Owner,
                PropertyKey::Devices,
                PropertyKey::Resources,
            ]
        );
    }

    #[test]
    fn test_payload_must_be_object() {
        let result = PropertyUpdate::from_json(&json!(["members"]));
        assert!(matches!(result, Err(GroupError::BadRequest(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PropertyUpdate::from_json_str("{ members: "),
            Err(GroupError::BadRequest(_))
        ));
    }
}
