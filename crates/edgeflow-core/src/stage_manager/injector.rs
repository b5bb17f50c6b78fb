//! Configuration injection.
//!
//! [`ConfigInjector`] turns the ordered name/value entries of a stage
//! configuration into a typed configuration tree that matches the stage's
//! [`ConfigSchema`]. Names are resolved against the schema (dotted names
//! descend into groups), `${NAME}` placeholders are expanded from pipeline
//! parameters, and every value is coerced to its declared type. The tree is
//! only handed to the stage once every entry has been accepted.
use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

use crate::config::{Config, ConfigValue};
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::schema::{ConfigDef, ConfigSchema, ConfigType};

type InjectResult<T> = std::result::Result<T, StageSystemError>;

/// Stateless injector; one instance can be shared by every stage construction
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigInjector;

impl ConfigInjector {
    pub fn new() -> Self {
        Self
    }

    /// Build the typed configuration tree for `stage` from `configs`.
    ///
    /// Fails on the first entry that does not resolve or does not coerce, and
    /// when a required field was not supplied.
    pub fn inject(
        &self,
        stage: &str,
        schema: &ConfigSchema,
        configs: &[Config],
        parameters: &BTreeMap<String, ConfigValue>,
    ) -> InjectResult<Value> {
        let mut root = Map::new();

        for config in configs {
            let segments: Vec<&str> = config.name.split('.').collect();
            let injection = Injection {
                stage,
                full_name: &config.name,
                parameters,
            };
            injection.insert(&mut root, schema, &segments, &config.value)?;
        }

        check_required(stage, schema, Some(&root), "")?;
        Ok(Value::Object(root))
    }
}

/// Per-entry state carried through the recursive descent
struct Injection<'a> {
    stage: &'a str,
    full_name: &'a str,
    parameters: &'a BTreeMap<String, ConfigValue>,
}

impl Injection<'_> {
    fn unknown_field(&self) -> StageSystemError {
        StageSystemError::UnknownConfigField {
            stage: self.stage.to_string(),
            field: self.full_name.to_string(),
        }
    }

    fn insert(
        &self,
        target: &mut Map<String, Value>,
        schema: &ConfigSchema,
        segments: &[&str],
        value: &ConfigValue,
    ) -> InjectResult<()> {
        let (head, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Err(self.unknown_field()),
        };
        let def = schema.field(head).ok_or_else(|| self.unknown_field())?;

        if rest.is_empty() {
            return self.assign(target, def, value);
        }

        let inner_schema = match &def.config_type {
            ConfigType::Group(inner) => inner,
            _ => return Err(self.unknown_field()),
        };
        let group = target
            .entry(def.name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !group.is_object() {
            *group = Value::Object(Map::new());
        }
        match group.as_object_mut() {
            Some(group) => self.insert(group, inner_schema, rest, value),
            None => Err(StageSystemError::InternalError(format!(
                "configuration group '{}' is not an object",
                def.name
            ))),
        }
    }

    fn assign(&self, target: &mut Map<String, Value>, def: &ConfigDef, value: &ConfigValue) -> InjectResult<()> {
        let expanded;
        let value = if def.expandable {
            expanded = expand_parameters(value, self.parameters);
            &expanded
        } else {
            value
        };

        let coerced = coerce(self.stage, self.full_name, &def.config_type, value)?;
        if coerced.is_null() {
            return Ok(());
        }
        if target.insert(def.name.clone(), coerced).is_some() {
            log::debug!(
                "Stage '{}': configuration '{}' supplied more than once, last value wins",
                self.stage,
                self.full_name
            );
        }
        Ok(())
    }
}

fn type_mismatch(stage: &str, path: &str, expected: &ConfigType, found: &ConfigValue) -> StageSystemError {
    StageSystemError::TypeMismatch {
        stage: stage.to_string(),
        field: path.to_string(),
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

/// Coerce a dynamic value to `expected`, recursing into lists, maps and groups.
/// `Null` coerces to JSON null for every type, leaving the field at its default.
pub fn coerce(stage: &str, path: &str, expected: &ConfigType, value: &ConfigValue) -> InjectResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match (expected, value) {
        (ConfigType::String, ConfigValue::String(s)) => Ok(Value::String(s.clone())),
        (ConfigType::Boolean, ConfigValue::Bool(b)) => Ok(Value::Bool(*b)),
        (ConfigType::Integer, ConfigValue::Integer(i)) => Ok(Value::from(*i)),
        // Definitions commonly carry every number as a float
        (ConfigType::Integer, ConfigValue::Float(f))
            if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Ok(Value::from(*f as i64))
        }
        (ConfigType::Float, ConfigValue::Integer(i)) => Number::from_f64(*i as f64)
            .map(Value::Number)
            .ok_or_else(|| type_mismatch(stage, path, expected, value)),
        (ConfigType::Float, ConfigValue::Float(f)) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| type_mismatch(stage, path, expected, value)),
        (ConfigType::List(element), ConfigValue::List(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| coerce(stage, &format!("{}[{}]", path, index), element, item))
            .collect::<InjectResult<Vec<_>>>()
            .map(Value::Array),
        (ConfigType::Map(element), ConfigValue::Map(entries)) => {
            let mut object = Map::new();
            for (key, item) in entries {
                let coerced = coerce(stage, &format!("{}.{}", path, key), element, item)?;
                object.insert(key.clone(), coerced);
            }
            Ok(Value::Object(object))
        }
        (ConfigType::Group(schema), ConfigValue::Map(entries)) => coerce_group(stage, path, schema, entries),
        _ => Err(type_mismatch(stage, path, expected, value)),
    }
}

/// A mapping expanded field by field into a configuration group
fn coerce_group(
    stage: &str,
    path: &str,
    schema: &ConfigSchema,
    entries: &BTreeMap<String, ConfigValue>,
) -> InjectResult<Value> {
    let mut object = Map::new();
    for (key, item) in entries {
        let field_path = format!("{}.{}", path, key);
        let def = schema.field(key).ok_or_else(|| StageSystemError::UnknownConfigField {
            stage: stage.to_string(),
            field: field_path.clone(),
        })?;
        let coerced = coerce(stage, &field_path, &def.config_type, item)?;
        if !coerced.is_null() {
            object.insert(def.name.clone(), coerced);
        }
    }
    check_required(stage, schema, Some(&object), path)?;
    Ok(Value::Object(object))
}

fn check_required(
    stage: &str,
    schema: &ConfigSchema,
    supplied: Option<&Map<String, Value>>,
    prefix: &str,
) -> InjectResult<()> {
    for def in schema.fields() {
        let path = if prefix.is_empty() {
            def.name.clone()
        } else {
            format!("{}.{}", prefix, def.name)
        };
        let present = supplied.and_then(|map| map.get(&def.name));

        if def.required && present.is_none() {
            return Err(StageSystemError::MissingRequiredConfig {
                stage: stage.to_string(),
                field: path,
            });
        }
        // Groups are checked even when absent so their required members are reported
        if let ConfigType::Group(inner) = &def.config_type {
            check_required(stage, inner, present.and_then(Value::as_object), &path)?;
        }
    }
    Ok(())
}

/// Replace `${NAME}` placeholders with pipeline parameters.
///
/// A string that is exactly one placeholder takes the parameter's value with
/// its own type; embedded placeholders are replaced textually. Unknown names
/// are left untouched.
pub fn expand_parameters(value: &ConfigValue, parameters: &BTreeMap<String, ConfigValue>) -> ConfigValue {
    match value {
        ConfigValue::String(s) => {
            if let Some(name) = whole_placeholder(s) {
                if let Some(parameter) = parameters.get(name) {
                    return parameter.clone();
                }
            }
            ConfigValue::String(expand_str(s, parameters))
        }
        ConfigValue::List(items) => {
            ConfigValue::List(items.iter().map(|item| expand_parameters(item, parameters)).collect())
        }
        ConfigValue::Map(entries) => ConfigValue::Map(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), expand_parameters(item, parameters)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn whole_placeholder(s: &str) -> Option<&str> {
    let name = s.trim().strip_prefix("${")?.strip_suffix('}')?;
    if name.contains('}') || name.contains("${") {
        None
    } else {
        Some(name)
    }
}

fn expand_str(s: &str, parameters: &BTreeMap<String, ConfigValue>) -> String {
    let mut output = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match parameters.get(name) {
                    Some(parameter) => output.push_str(&parameter.to_string()),
                    None => output.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}
