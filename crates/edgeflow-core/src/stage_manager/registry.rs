use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use semver::{Version, VersionReq};
use serde::de::DeserializeOwned;

use crate::config::StageConfiguration;
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::schema::ConfigSchema;
use crate::stage_manager::{Stage, StageType};

type RegistryResult<T> = std::result::Result<T, StageSystemError>;

/// Static description of a stage implementation, used for typed registration.
///
/// `Config` is the stage's configuration struct; the injected configuration
/// tree is deserialized into it with serde, so it should use
/// `#[serde(rename_all = "camelCase", default)]` to match the schema names.
pub trait StageDescriptor: Stage + Default + 'static {
    type Config: DeserializeOwned + Send + Sync;

    const LIBRARY: &'static str;
    const STAGE_NAME: &'static str;
    const VERSION: &'static str = "1.0.0";
    const STAGE_TYPE: StageType;

    fn label() -> &'static str {
        Self::STAGE_NAME
    }

    fn description() -> &'static str {
        ""
    }

    fn config_schema() -> ConfigSchema;

    /// Slot the bound configuration is written to
    fn config_mut(&mut self) -> &mut Self::Config;
}

type Constructor = fn() -> Box<dyn Stage>;
type Binder = fn(&mut dyn Stage, serde_json::Value, &str) -> RegistryResult<()>;

fn construct<S: StageDescriptor>() -> Box<dyn Stage> {
    Box::new(S::default())
}

fn bind<S: StageDescriptor>(stage: &mut dyn Stage, tree: serde_json::Value, instance: &str) -> RegistryResult<()> {
    let concrete = stage.as_any_mut().downcast_mut::<S>().ok_or_else(|| {
        StageSystemError::InternalError(format!(
            "stage instance '{}' is not a {}",
            instance,
            S::STAGE_NAME
        ))
    })?;
    let config: S::Config = serde_path_to_error::deserialize(tree).map_err(|e| StageSystemError::TypeMismatch {
        stage: instance.to_string(),
        field: e.path().to_string(),
        expected: format!("a valid {} configuration", S::STAGE_NAME),
        found: e.into_inner().to_string(),
    })?;
    *concrete.config_mut() = config;
    Ok(())
}

/// Registered stage: metadata, schema, constructor and config binder
pub struct StageDefinition {
    pub library: String,
    pub stage_name: String,
    pub version: Version,
    pub stage_type: StageType,
    pub label: String,
    pub description: String,
    pub schema: ConfigSchema,
    constructor: Constructor,
    binder: Binder,
}

impl StageDefinition {
    fn of<S: StageDescriptor>() -> RegistryResult<Self> {
        let invalid = |reason: String| StageSystemError::InvalidStageDefinition {
            library: S::LIBRARY.to_string(),
            stage_name: S::STAGE_NAME.to_string(),
            reason,
        };

        let version = Version::parse(S::VERSION).map_err(|e| invalid(format!("version '{}': {}", S::VERSION, e)))?;
        let schema = S::config_schema();
        schema.validate().map_err(invalid)?;

        Ok(Self {
            library: S::LIBRARY.to_string(),
            stage_name: S::STAGE_NAME.to_string(),
            version,
            stage_type: S::STAGE_TYPE,
            label: S::label().to_string(),
            description: S::description().to_string(),
            schema,
            constructor: construct::<S>,
            binder: bind::<S>,
        })
    }

    /// New, unconfigured instance
    pub fn instantiate(&self) -> Box<dyn Stage> {
        (self.constructor)()
    }

    /// Bind an injected configuration tree to an instance created by this definition
    pub fn bind(&self, stage: &mut dyn Stage, tree: serde_json::Value, instance: &str) -> RegistryResult<()> {
        (self.binder)(stage, tree, instance)
    }
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("library", &self.library)
            .field("stage_name", &self.stage_name)
            .field("version", &self.version)
            .field("stage_type", &self.stage_type)
            .finish()
    }
}

/// Registry of stage definitions keyed by `(library, stage name)`.
///
/// Populated at startup, then shared read-only (`Arc<StageRegistry>`) by
/// every pipeline.
pub struct StageRegistry {
    stages: HashMap<(String, String), StageDefinition>,
}

// Manual Debug implementation
impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .definitions()
            .iter()
            .map(|d| format!("{}:{}", d.library, d.stage_name))
            .collect();
        f.debug_struct("StageRegistry").field("stages", &keys).finish()
    }
}

impl StageRegistry {
    /// Create a new stage registry
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    /// Register a stage implementation
    pub fn register<S: StageDescriptor>(&mut self) -> RegistryResult<()> {
        let key = (S::LIBRARY.to_string(), S::STAGE_NAME.to_string());
        if self.stages.contains_key(&key) {
            return Err(StageSystemError::StageAlreadyRegistered {
                library: key.0,
                stage_name: key.1,
            });
        }

        let definition = StageDefinition::of::<S>()?;
        log::debug!(
            "Registered {} stage '{}' v{} from library '{}'",
            definition.stage_type,
            definition.stage_name,
            definition.version,
            definition.library
        );
        self.stages.insert(key, definition);
        Ok(())
    }

    /// Check if a stage is registered
    pub fn has_stage(&self, library: &str, stage_name: &str) -> bool {
        self.stages
            .contains_key(&(library.to_string(), stage_name.to_string()))
    }

    /// Look up a stage definition
    pub fn get_definition(&self, library: &str, stage_name: &str) -> RegistryResult<&StageDefinition> {
        self.stages
            .get(&(library.to_string(), stage_name.to_string()))
            .ok_or_else(|| StageSystemError::UnknownStage {
                library: library.to_string(),
                stage_name: stage_name.to_string(),
            })
    }

    /// Look up the definition a stage configuration refers to, checking the
    /// requested stage version is satisfied by the registered one
    pub fn resolve(&self, stage_config: &StageConfiguration) -> RegistryResult<&StageDefinition> {
        let definition = self.get_definition(&stage_config.library, &stage_config.stage_name)?;

        if let Some(requested) = stage_config.stage_version.as_deref() {
            let mismatch = || StageSystemError::StageVersionMismatch {
                stage_name: stage_config.stage_name.clone(),
                requested: requested.to_string(),
                registered: definition.version.to_string(),
            };
            let requirement = VersionReq::parse(&format!("^{}", requested.trim())).map_err(|_| mismatch())?;
            if !requirement.matches(&definition.version) {
                return Err(mismatch());
            }
        }
        Ok(definition)
    }

    /// Create a new, unconfigured instance of a registered stage
    pub fn create_stage_instance(&self, library: &str, stage_name: &str) -> RegistryResult<Box<dyn Stage>> {
        Ok(self.get_definition(library, stage_name)?.instantiate())
    }

    /// All definitions, sorted by library then stage name
    pub fn definitions(&self) -> Vec<&StageDefinition> {
        let mut definitions: Vec<&StageDefinition> = self.stages.values().collect();
        definitions.sort_by(|a, b| (&a.library, &a.stage_name).cmp(&(&b.library, &b.stage_name)));
        definitions
    }

    /// Get the number of registered stages
    pub fn count(&self) -> usize {
        self.stages.len()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<StageRegistry>> = OnceLock::new();

/// Freeze a populated registry as the process-wide registry. Succeeds once.
pub fn install_global_registry(registry: StageRegistry) -> RegistryResult<Arc<StageRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(Arc::clone(&registry))
        .map_err(|_| StageSystemError::RegistryAlreadyInstalled)?;
    log::info!("Installed global stage registry with {} stages", registry.count());
    Ok(registry)
}

/// The process-wide registry, if one was installed
pub fn global_registry() -> Option<Arc<StageRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
