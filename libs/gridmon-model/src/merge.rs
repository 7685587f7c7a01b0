//! Template Config Merging
//!
//! Combines a template's default configuration with an optional per-target
//! override into one resolved rule configuration.

use serde_json::{Map, Value};

use crate::condition::validate_condition_config;
use crate::error::{ModelError, Result};
use crate::types::AlarmTemplate;

/// Merge a template's default config with a per-target override and validate
/// the result.
///
/// Shallow overlay: a key present in the override replaces the default value
/// wholesale, nested objects included; there is no deep merge. The template
/// itself is never mutated. An incomplete merge fails with
/// `ModelError::InvalidConditionConfig` naming the missing fields.
pub fn merge_rule_config(
    template: &AlarmTemplate,
    override_config: Option<&Map<String, Value>>,
) -> Result<Map<String, Value>> {
    let mut resolved = template.default_config.clone();
    if let Some(overlay) = override_config {
        for (key, value) in overlay {
            resolved.insert(key.clone(), value.clone());
        }
    }

    let check = validate_condition_config(template.condition_type, &resolved);
    if check.ok {
        Ok(resolved)
    } else {
        Err(ModelError::InvalidConditionConfig {
            missing_fields: check.missing_fields,
        })
    }
}
