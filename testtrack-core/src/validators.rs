//! Grammar checks for names, versions, and prefixes, plus schema-presence
//! and owner-file lookups that the rest of the crate depends on.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::error::{Result, TestTrackError};
use crate::schema::Schema;

const APP_VERSION_MAX_LEN: usize = 18;

static SNAKE_CASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z_\d]+$").unwrap());
static SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[a-z_\-\d]+\.)?[a-z_\d]+$").unwrap());
static NON_PREFIXED_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z_\d]+$").unwrap());
static APP_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(?:0|[1-9]\d*)\.){0,2}(?:0|[1-9]\d*)$").unwrap());

fn invalid(param: &str, message: impl Into<String>) -> TestTrackError {
    TestTrackError::InvalidInput(format!("{param} {}", message.into()))
}

pub fn presence(param: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(param, "must be present"));
    }
    Ok(())
}

pub fn snake_case(param: &str, value: &str) -> Result<()> {
    presence(param, value)?;
    if !SNAKE_CASE_RE.is_match(value) {
        return Err(invalid(param, format!("'{value}' must be snake_case alphanumeric")));
    }
    Ok(())
}

pub fn optional_snake_case(param: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => snake_case(param, v),
        None => Ok(()),
    }
}

pub fn split_name(param: &str, value: &str) -> Result<()> {
    presence(param, value)?;
    if !SPLIT_RE.is_match(value) {
        return Err(invalid(param, format!("'{value}' must be a valid split name")));
    }
    Ok(())
}

pub fn non_prefixed_split(param: &str, value: &str) -> Result<()> {
    presence(param, value)?;
    if !NON_PREFIXED_SPLIT_RE.is_match(value) {
        return Err(invalid(
            param,
            format!("'{value}' must not carry an app prefix"),
        ));
    }
    Ok(())
}

pub fn experiment_name(param: &str, value: &str) -> Result<()> {
    split_name(param, value)?;
    if !value.ends_with("_experiment") {
        return Err(invalid(param, format!("'{value}' must end in _experiment")));
    }
    Ok(())
}

pub fn feature_gate_name(param: &str, value: &str) -> Result<()> {
    split_name(param, value)?;
    if !value.ends_with("_enabled") {
        return Err(invalid(param, format!("'{value}' must end in _enabled")));
    }
    Ok(())
}

pub fn optional_app_version(param: &str, value: Option<&str>) -> Result<()> {
    let Some(version) = value else {
        return Ok(());
    };
    if !APP_VERSION_RE.is_match(version) {
        return Err(invalid(
            param,
            format!("'{version}' must be made up of no more than three integers with dots in between"),
        ));
    }
    if version.len() > APP_VERSION_MAX_LEN {
        return Err(invalid(
            param,
            format!("'{version}' must be {APP_VERSION_MAX_LEN} characters or less"),
        ));
    }
    Ok(())
}

pub fn split_exists_in_schema(schema: &Schema, name: &str) -> Result<()> {
    if schema.splits.iter().any(|s| s.name == name) {
        Ok(())
    } else {
        Err(TestTrackError::NotFoundInSchema {
            name: name.to_string(),
        })
    }
}

pub fn variant_exists_in_schema(schema: &Schema, split: &str, variant: &str) -> Result<()> {
    let found = schema
        .splits
        .iter()
        .find(|s| s.name == split)
        .map(|s| s.weights.contains(variant))
        .unwrap_or(false);
    if found {
        Ok(())
    } else {
        Err(TestTrackError::NotFoundInSchema {
            name: format!("{split}:{variant}"),
        })
    }
}

/// Validates `owner` against an ownership file's top-level keys, loaded as a
/// plain YAML mapping. If the file does not exist, `owner` must be empty.
pub fn validate_owner_name(owner: Option<&str>, ownership_file: &std::path::Path) -> Result<()> {
    let owner = owner.unwrap_or("");
    if !ownership_file.exists() {
        if owner.is_empty() {
            return Ok(());
        }
        return Err(invalid(
            "owner",
            format!("'{owner}' specified but no ownership file was found at {}", ownership_file.display()),
        ));
    }
    let content = std::fs::read_to_string(ownership_file)?;
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(&content)?;
    if owner.is_empty() {
        return Ok(());
    }
    let has_owner = mapping
        .keys()
        .any(|k| k.as_str() == Some(owner));
    if has_owner {
        Ok(())
    } else {
        Err(invalid(
            "owner",
            format!("'{owner}' is not a key in {}", ownership_file.display()),
        ))
    }
}

/// Resolution outcome for [`auto_prefix_and_validate_split`].
pub struct AutoPrefixResult {
    pub resolved_name: String,
}

/// Resolves the final split name for a command that accepts an optional app
/// prefix, honoring `--no-prefix` and `--force` the way the CLI surface
/// does: prefer `<app>.<value>` if present in the schema, else fall back to
/// the literal value and require it to exist.
#[allow(clippy::too_many_arguments)]
pub fn auto_prefix_and_validate_split(
    param: &str,
    value: &str,
    app_name: Option<&str>,
    schema: &Schema,
    no_prefix: bool,
    force: bool,
) -> Result<AutoPrefixResult> {
    let is_prefixed = value.contains('.');

    if no_prefix && is_prefixed {
        return Err(invalid(
            param,
            format!("'{value}' already carries a prefix; --no-prefix is mutually exclusive with a prefixed name"),
        ));
    }

    split_name(param, value)?;

    if force {
        return Ok(AutoPrefixResult {
            resolved_name: value.to_string(),
        });
    }

    if !is_prefixed && !no_prefix {
        if let Some(app) = app_name {
            let prefixed = format!("{app}.{value}");
            if schema.splits.iter().any(|s| s.name == prefixed) {
                return Ok(AutoPrefixResult {
                    resolved_name: prefixed,
                });
            }
        }
    }

    if schema.splits.iter().any(|s| s.name == value) {
        return Ok(AutoPrefixResult {
            resolved_name: value.to_string(),
        });
    }

    Err(TestTrackError::NotFoundInSchema {
        name: value.to_string(),
    })
}
