use std::collections::BTreeMap;
use std::fmt;

use semver::Version;

use crate::config::{ConfigValue, StageConfiguration};
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::injector::ConfigInjector;
use crate::stage_manager::registry::{StageDefinition, StageRegistry};
use crate::stage_manager::{Stage, StageType};

/// Registry metadata of the stage a bean was built from
#[derive(Debug, Clone, PartialEq)]
pub struct StageSystemConfigs {
    pub library: String,
    pub stage_name: String,
    pub version: Version,
    pub stage_type: StageType,
    pub label: String,
    pub description: String,
}

impl From<&StageDefinition> for StageSystemConfigs {
    fn from(definition: &StageDefinition) -> Self {
        Self {
            library: definition.library.clone(),
            stage_name: definition.stage_name.clone(),
            version: definition.version.clone(),
            stage_type: definition.stage_type,
            label: definition.label.clone(),
            description: definition.description.clone(),
        }
    }
}

/// A constructed, fully configured stage that is ready for `init`
pub struct StageBean {
    pub stage: Box<dyn Stage>,
    pub stage_config: StageConfiguration,
    pub system_configs: StageSystemConfigs,
    pub ui_info: BTreeMap<String, ConfigValue>,
}

impl StageBean {
    pub fn instance_name(&self) -> &str {
        self.stage_config.instance_name()
    }

    pub fn stage_type(&self) -> StageType {
        self.system_configs.stage_type
    }
}

impl fmt::Debug for StageBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageBean")
            .field("instance_name", &self.instance_name())
            .field("system_configs", &self.system_configs)
            .finish()
    }
}

/// Construct the stage a configuration names and inject its configuration.
///
/// Injection is all-or-nothing: the instance only receives its configuration
/// once every entry resolved and coerced.
pub fn new_stage_bean(
    registry: &StageRegistry,
    stage_config: &StageConfiguration,
    parameters: &BTreeMap<String, ConfigValue>,
) -> std::result::Result<StageBean, StageSystemError> {
    let definition = registry.resolve(stage_config)?;
    let instance = stage_config.instance_name();

    let tree = ConfigInjector::new().inject(instance, &definition.schema, &stage_config.configuration, parameters)?;

    let mut stage = definition.instantiate();
    definition.bind(stage.as_mut(), tree, instance)?;

    let has_capability = match definition.stage_type {
        StageType::Origin => stage.as_origin().is_some(),
        StageType::Processor => stage.as_processor().is_some(),
        StageType::Destination => stage.as_destination().is_some(),
    };
    if !has_capability {
        return Err(StageSystemError::MissingCapability {
            instance: instance.to_string(),
            capability: definition.stage_type.to_string(),
        });
    }

    log::debug!(
        "Created stage bean '{}' ({}:{} v{})",
        instance,
        definition.library,
        definition.stage_name,
        definition.version
    );

    Ok(StageBean {
        stage,
        stage_config: stage_config.clone(),
        system_configs: StageSystemConfigs::from(definition),
        ui_info: stage_config.ui_info.clone(),
    })
}
