//! Declarative configuration schema of a stage.
//!
//! A schema lists the configuration fields a stage accepts, with their
//! semantic type. Groups nest another schema and are addressed with dotted
//! names (`commonConf.brokerUrl`).
use std::collections::HashSet;
use std::fmt;

/// Semantic type of a configuration field
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigType {
    String,
    Integer,
    Float,
    Boolean,
    /// Ordered sequence of the element type
    List(Box<ConfigType>),
    /// String-keyed mapping of the value type
    Map(Box<ConfigType>),
    /// Nested configuration group
    Group(ConfigSchema),
}

impl ConfigType {
    pub fn list_of(element: ConfigType) -> Self {
        ConfigType::List(Box::new(element))
    }

    pub fn map_of(value: ConfigType) -> Self {
        ConfigType::Map(Box::new(value))
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigType::String => write!(f, "string"),
            ConfigType::Integer => write!(f, "integer"),
            ConfigType::Float => write!(f, "number"),
            ConfigType::Boolean => write!(f, "boolean"),
            ConfigType::List(element) => write!(f, "list of {}", element),
            ConfigType::Map(value) => write!(f, "map of {}", value),
            ConfigType::Group(_) => write!(f, "group"),
        }
    }
}

/// Definition of a single configuration field
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDef {
    pub name: String,
    pub config_type: ConfigType,
    pub required: bool,
    /// `${NAME}` placeholders are replaced with pipeline parameters
    pub expandable: bool,
    pub label: String,
}

impl ConfigDef {
    pub fn new(name: impl Into<String>, config_type: ConfigType) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            config_type,
            required: false,
            expandable: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ConfigType::Boolean)
    }

    pub fn list(name: impl Into<String>, element: ConfigType) -> Self {
        Self::new(name, ConfigType::list_of(element))
    }

    pub fn map(name: impl Into<String>, value: ConfigType) -> Self {
        Self::new(name, ConfigType::map_of(value))
    }

    pub fn group(name: impl Into<String>, schema: ConfigSchema) -> Self {
        Self::new(name, ConfigType::Group(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn expandable(mut self) -> Self {
        self.expandable = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Ordered set of configuration field definitions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigSchema {
    fields: Vec<ConfigDef>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: ConfigDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[ConfigDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ConfigDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a dotted path (`commonConf.brokerUrl`) to its field definition
    pub fn resolve(&self, path: &str) -> Option<&ConfigDef> {
        let mut schema = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let def = schema.field(segment)?;
            if segments.peek().is_none() {
                return Some(def);
            }
            match &def.config_type {
                ConfigType::Group(inner) => schema = inner,
                _ => return None,
            }
        }
        None
    }

    /// Check names are non-empty, dot-free and unique at every nesting level
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for def in &self.fields {
            if def.name.is_empty() || def.name.contains('.') {
                return Err(format!("invalid configuration field name '{}'", def.name));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(format!("duplicate configuration field '{}'", def.name));
            }
            validate_type(&def.config_type)
                .map_err(|reason| format!("field '{}': {}", def.name, reason))?;
        }
        Ok(())
    }
}

fn validate_type(config_type: &ConfigType) -> Result<(), String> {
    match config_type {
        ConfigType::Group(schema) => schema.validate(),
        ConfigType::List(element) | ConfigType::Map(element) => validate_type(element),
        _ => Ok(()),
    }
}
