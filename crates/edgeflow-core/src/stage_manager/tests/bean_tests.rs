use std::any::Any;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{ConfigValue, StageConfiguration};
use crate::kernel::error::Result;
use crate::stage_manager::bean::new_stage_bean;
use crate::stage_manager::core_stages::{FilterMode, RecordFilterProcessor, register_core_stages};
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::registry::{StageDescriptor, StageRegistry};
use crate::stage_manager::schema::{ConfigDef, ConfigSchema};
use crate::stage_manager::{Batch, Destination, Stage, StageContext, StageType};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CommonConf {
    broker_url: String,
    client_id: String,
    qos: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PublisherConf {
    topic: String,
    data_format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MqttConfig {
    common_conf: CommonConf,
    publisher_conf: PublisherConf,
}

// Publisher-shaped destination used to check grouped configuration injection
#[derive(Debug, Default)]
struct MqttDestination {
    config: MqttConfig,
}

#[async_trait]
impl Stage for MqttDestination {
    async fn init(&mut self, _context: &StageContext) -> Result<()> {
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_destination(&mut self) -> Option<&mut dyn Destination> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[async_trait]
impl Destination for MqttDestination {
    async fn write(&mut self, _batch: &Batch) -> Result<()> {
        Ok(())
    }
}

impl StageDescriptor for MqttDestination {
    type Config = MqttConfig;

    const LIBRARY: &'static str = "test-lib";
    const STAGE_NAME: &'static str = "mqtt";
    const STAGE_TYPE: StageType = StageType::Destination;

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_field(ConfigDef::group(
                "commonConf",
                ConfigSchema::new()
                    .with_field(ConfigDef::string("brokerUrl").required())
                    .with_field(ConfigDef::string("clientId"))
                    .with_field(ConfigDef::integer("qos")),
            ))
            .with_field(ConfigDef::group(
                "publisherConf",
                ConfigSchema::new()
                    .with_field(ConfigDef::string("topic").expandable())
                    .with_field(ConfigDef::string("dataFormat")),
            ))
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

// Declared as an origin but never exposes the origin capability
#[derive(Debug, Default)]
struct HollowOrigin {
    config: MqttConfig,
}

#[async_trait]
impl Stage for HollowOrigin {
    async fn init(&mut self, _context: &StageContext) -> Result<()> {
        Ok(())
    }

    async fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl StageDescriptor for HollowOrigin {
    type Config = MqttConfig;

    const LIBRARY: &'static str = "test-lib";
    const STAGE_NAME: &'static str = "hollow";
    const STAGE_TYPE: StageType = StageType::Origin;

    fn config_schema() -> ConfigSchema {
        ConfigSchema::new()
    }

    fn config_mut(&mut self) -> &mut Self::Config {
        &mut self.config
    }
}

fn registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    registry.register::<MqttDestination>().expect("mqtt");
    registry.register::<HollowOrigin>().expect("hollow");
    register_core_stages(&mut registry).expect("core stages");
    registry
}

fn mqtt_stage_config() -> StageConfiguration {
    StageConfiguration::new("test-lib", "mqtt")
        .with_instance_name("mqtt-out")
        .with_config("commonConf.brokerUrl", "tcp://localhost:1883")
        .with_config("commonConf.clientId", "edge-agent")
        .with_config("commonConf.qos", 2.0)
        .with_config("publisherConf.topic", "sensors/temperature")
        .with_config("publisherConf.dataFormat", "JSON")
}

#[test]
fn test_new_stage_bean_injects_grouped_configuration() {
    let registry = registry();

    let bean = new_stage_bean(&registry, &mqtt_stage_config(), &BTreeMap::new()).expect("bean");

    assert_eq!(bean.instance_name(), "mqtt-out");
    assert_eq!(bean.stage_type(), StageType::Destination);
    assert_eq!(bean.system_configs.stage_name, "mqtt");
    assert_eq!(bean.system_configs.library, "test-lib");

    let stage = bean
        .stage
        .as_any()
        .downcast_ref::<MqttDestination>()
        .expect("stage should be an MqttDestination");
    assert_eq!(stage.config.common_conf.broker_url, "tcp://localhost:1883");
    assert_eq!(stage.config.common_conf.client_id, "edge-agent");
    assert_eq!(stage.config.common_conf.qos, 2);
    assert_eq!(stage.config.publisher_conf.topic, "sensors/temperature");
    assert_eq!(stage.config.publisher_conf.data_format, "JSON");
}

#[test]
fn test_new_stage_bean_expands_parameters() {
    let registry = registry();
    let mut params = BTreeMap::new();
    params.insert("SITE".to_string(), ConfigValue::from("plant-7"));
    let stage_config = mqtt_stage_config().with_config("publisherConf.topic", "${SITE}/temperature");

    let bean = new_stage_bean(&registry, &stage_config, &params).expect("bean");

    let stage = bean.stage.as_any().downcast_ref::<MqttDestination>().expect("mqtt");
    assert_eq!(stage.config.publisher_conf.topic, "plant-7/temperature");
}

#[test]
fn test_new_stage_bean_keeps_ui_info() {
    let registry = registry();
    let mut stage_config = mqtt_stage_config();
    stage_config.ui_info.insert("label".to_string(), ConfigValue::from("MQTT Publisher"));

    let bean = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).expect("bean");

    assert_eq!(bean.ui_info.get("label"), Some(&ConfigValue::from("MQTT Publisher")));
}

#[test]
fn test_new_stage_bean_unknown_stage() {
    let registry = registry();
    let stage_config = StageConfiguration::new("test-lib", "kafka");

    let err = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).unwrap_err();

    assert!(matches!(err, StageSystemError::UnknownStage { .. }));
}

#[test]
fn test_new_stage_bean_fails_on_bad_entry() {
    let registry = registry();
    let stage_config = mqtt_stage_config().with_config("commonConf.qos", "high");

    let err = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).unwrap_err();

    match err {
        StageSystemError::TypeMismatch { stage, field, .. } => {
            assert_eq!(stage, "mqtt-out");
            assert_eq!(field, "commonConf.qos");
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_binding_failure_is_type_mismatch() {
    let registry = registry();
    let stage_config = StageConfiguration::new(crate::kernel::constants::BASIC_LIBRARY, "record_filter")
        .with_config("filterConf.pattern", "ERROR")
        .with_config("filterConf.mode", "BOTH");

    let err = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).unwrap_err();

    match err {
        StageSystemError::TypeMismatch { stage, field, found, .. } => {
            assert_eq!(stage, "record_filter");
            assert_eq!(field, "filterConf.mode");
            assert!(found.contains("BOTH"), "unexpected message: {}", found);
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_enum_configuration_binds() {
    let registry = registry();
    let stage_config = StageConfiguration::new(crate::kernel::constants::BASIC_LIBRARY, "record_filter")
        .with_config("filterConf.pattern", "DEBUG")
        .with_config("filterConf.mode", "DROP");

    let bean = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).expect("bean");

    let filter = bean.stage.as_any().downcast_ref::<RecordFilterProcessor>().expect("filter");
    assert_eq!(filter.config().filter_conf.pattern, "DEBUG");
    assert_eq!(filter.config().filter_conf.mode, FilterMode::Drop);
}

#[test]
fn test_missing_capability_is_rejected() {
    let registry = registry();
    let stage_config = StageConfiguration::new("test-lib", "hollow");

    let err = new_stage_bean(&registry, &stage_config, &BTreeMap::new()).unwrap_err();

    assert!(matches!(
        err,
        StageSystemError::MissingCapability { ref instance, ref capability }
            if instance == "hollow" && capability == "origin"
    ));
}
