//! # Build Environment Export
//!
//! Converts a webhook payload into the flat `DDB_*` variables exported to the
//! steps of a DeployDB-triggered build.
//!
//! Nested mappings are walked recursively; each level contributes its key plus
//! an underscore to the name of everything below it, and the final name is
//! converted from lower camel case to upper snake case:
//!
//! ```text
//! {"artifact": {"sourceUrl": "http://..."}}  ->  DDB_ARTIFACT_SOURCE_URL=http://...
//! ```

use crate::payload::{PayloadValue, TriggerEvent};
use std::collections::BTreeMap;

/// Prefix of every exported variable name
pub const ENV_VAR_PREFIX: &str = "DDB_";

/// Convert a lower camel case name to upper snake case
///
/// An underscore is inserted before every uppercase character except the first
/// one, then the whole name is uppercased. Existing underscores are kept, so
/// already-prefixed names convert cleanly: `artifact_sourceUrl` becomes
/// `ARTIFACT_SOURCE_URL`.
pub fn to_upper_snake_case(name: &str) -> String {
    let mut converted = String::with_capacity(name.len() + 4);
    for (index, c) in name.chars().enumerate() {
        if index > 0 && c.is_uppercase() {
            converted.push('_');
        }
        converted.extend(c.to_uppercase());
    }
    converted
}

/// Variable name for a key at the given nesting prefix
fn env_key(prefix: &str, key: &str) -> String {
    format!("{}{}", ENV_VAR_PREFIX, to_upper_snake_case(&format!("{prefix}{key}")))
}

/// Flatten a payload mapping into environment variables
///
/// The result is sorted by variable name, so the output does not depend on the
/// order in which fields arrived.
pub fn flatten(values: &BTreeMap<String, PayloadValue>) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    flatten_into(&mut env, "", values);
    env
}

fn flatten_into(
    env: &mut BTreeMap<String, String>,
    prefix: &str,
    values: &BTreeMap<String, PayloadValue>,
) {
    for (key, value) in values {
        match value {
            PayloadValue::Nested(children) => {
                flatten_into(env, &format!("{prefix}{key}_"), children);
            }
            PayloadValue::Scalar(text) => {
                env.insert(env_key(prefix, key), text.clone());
            }
        }
    }
}

/// Build the complete environment for a DeployDB-triggered build
///
/// `DDB_EVENT_ID` and `DDB_SERVICE` are always present, the latter empty when
/// the payload had no service name. Payload fields are applied afterwards and
/// win on a name collision.
pub fn build_environment(event: &TriggerEvent) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert(env_key("", "eventId"), event.id().to_string());
    env.insert(
        env_key("", "service"),
        event.service().unwrap_or_default().to_string(),
    );
    env.extend(flatten(event.values()));
    env
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
