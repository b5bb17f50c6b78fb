use std::collections::BTreeMap;

use serde_json::json;

use crate::config::{Config, ConfigValue};
use crate::stage_manager::error::StageSystemError;
use crate::stage_manager::injector::{ConfigInjector, expand_parameters};
use crate::stage_manager::schema::{ConfigDef, ConfigSchema, ConfigType};

fn mqtt_schema() -> ConfigSchema {
    ConfigSchema::new()
        .with_field(ConfigDef::group(
            "commonConf",
            ConfigSchema::new()
                .with_field(ConfigDef::string("brokerUrl").required().expandable())
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

fn filetail_schema() -> ConfigSchema {
    let file_info = ConfigSchema::new()
        .with_field(ConfigDef::string("fileFullPath").required().expandable())
        .with_field(ConfigDef::string("tag"));
    ConfigSchema::new().with_field(ConfigDef::group(
        "conf",
        ConfigSchema::new()
            .with_field(ConfigDef::list("fileInfos", ConfigType::Group(file_info)).required().expandable())
            .with_field(ConfigDef::float("maxWaitTimeSecs"))
            .with_field(ConfigDef::integer("batchSize").expandable()),
    ))
}

fn no_params() -> BTreeMap<String, ConfigValue> {
    BTreeMap::new()
}

fn file_info(path: &str) -> ConfigValue {
    let mut map = BTreeMap::new();
    map.insert("fileFullPath".to_string(), ConfigValue::from(path));
    ConfigValue::Map(map)
}

#[test]
fn test_grouped_names_build_nested_tree() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("commonConf.clientId", "edge-1"),
        Config::new("commonConf.qos", 2.0),
        Config::new("publisherConf.topic", "sensors/values"),
        Config::new("publisherConf.dataFormat", "JSON"),
    ];

    let tree = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .expect("injection should succeed");

    assert_eq!(
        tree,
        json!({
            "commonConf": {"brokerUrl": "tcp://localhost:1883", "clientId": "edge-1", "qos": 2},
            "publisherConf": {"topic": "sensors/values", "dataFormat": "JSON"}
        })
    );
}

#[test]
fn test_unknown_field_is_rejected() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("commonConf.keepAlive", 30),
    ];

    let err = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .unwrap_err();

    match err {
        StageSystemError::UnknownConfigField { stage, field } => {
            assert_eq!(stage, "mqtt");
            assert_eq!(field, "commonConf.keepAlive");
        }
        other => panic!("Expected UnknownConfigField, got {:?}", other),
    }
}

#[test]
fn test_dotted_name_through_non_group_is_unknown() {
    let configs = vec![Config::new("commonConf.brokerUrl.host", "localhost")];

    let err = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .unwrap_err();

    assert!(matches!(err, StageSystemError::UnknownConfigField { .. }));
}

#[test]
fn test_type_mismatch_reports_field_and_types() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("commonConf.qos", "two"),
    ];

    let err = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .unwrap_err();

    match err {
        StageSystemError::TypeMismatch { field, expected, found, .. } => {
            assert_eq!(field, "commonConf.qos");
            assert_eq!(expected, "integer");
            assert_eq!(found, "string");
        }
        other => panic!("Expected TypeMismatch, got {:?}", other),
    }
}

#[test]
fn test_fractional_float_does_not_narrow_to_integer() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("commonConf.qos", 1.5),
    ];

    let result = ConfigInjector::new().inject("mqtt", &mqtt_schema(), &configs, &no_params());

    assert!(matches!(result, Err(StageSystemError::TypeMismatch { .. })));
}

#[test]
fn test_integer_widens_to_float() {
    let configs = vec![
        Config::new("conf.fileInfos", ConfigValue::List(vec![file_info("/var/log/app.log")])),
        Config::new("conf.maxWaitTimeSecs", 5),
    ];

    let tree = ConfigInjector::new()
        .inject("filetail", &filetail_schema(), &configs, &no_params())
        .expect("injection should succeed");

    assert_eq!(tree["conf"]["maxWaitTimeSecs"], json!(5.0));
}

#[test]
fn test_list_of_groups_is_coerced_element_by_element() {
    let configs = vec![Config::new(
        "conf.fileInfos",
        ConfigValue::List(vec![file_info("/var/log/a.log"), file_info("/var/log/b.log")]),
    )];

    let tree = ConfigInjector::new()
        .inject("filetail", &filetail_schema(), &configs, &no_params())
        .expect("injection should succeed");

    assert_eq!(
        tree["conf"]["fileInfos"],
        json!([{"fileFullPath": "/var/log/a.log"}, {"fileFullPath": "/var/log/b.log"}])
    );
}

#[test]
fn test_unknown_key_inside_list_element_reports_indexed_path() {
    let mut element = BTreeMap::new();
    element.insert("fileFullPath".to_string(), ConfigValue::from("/var/log/a.log"));
    element.insert("pattern".to_string(), ConfigValue::from("*.log"));
    let configs = vec![Config::new("conf.fileInfos", ConfigValue::List(vec![ConfigValue::Map(element)]))];

    let err = ConfigInjector::new()
        .inject("filetail", &filetail_schema(), &configs, &no_params())
        .unwrap_err();

    match err {
        StageSystemError::UnknownConfigField { field, .. } => assert_eq!(field, "conf.fileInfos[0].pattern"),
        other => panic!("Expected UnknownConfigField, got {:?}", other),
    }
}

#[test]
fn test_required_member_of_list_element_is_enforced() {
    let mut element = BTreeMap::new();
    element.insert("tag".to_string(), ConfigValue::from("app"));
    let configs = vec![Config::new("conf.fileInfos", ConfigValue::List(vec![ConfigValue::Map(element)]))];

    let err = ConfigInjector::new()
        .inject("filetail", &filetail_schema(), &configs, &no_params())
        .unwrap_err();

    match err {
        StageSystemError::MissingRequiredConfig { field, .. } => assert_eq!(field, "conf.fileInfos[0].fileFullPath"),
        other => panic!("Expected MissingRequiredConfig, got {:?}", other),
    }
}

#[test]
fn test_missing_required_field_in_absent_group() {
    let configs = vec![Config::new("publisherConf.topic", "sensors")];

    let err = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .unwrap_err();

    match err {
        StageSystemError::MissingRequiredConfig { stage, field } => {
            assert_eq!(stage, "mqtt");
            assert_eq!(field, "commonConf.brokerUrl");
        }
        other => panic!("Expected MissingRequiredConfig, got {:?}", other),
    }
}

#[test]
fn test_duplicate_entry_last_value_wins() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://first:1883"),
        Config::new("commonConf.brokerUrl", "tcp://second:1883"),
    ];

    let tree = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .expect("injection should succeed");

    assert_eq!(tree["commonConf"]["brokerUrl"], json!("tcp://second:1883"));
}

#[test]
fn test_null_value_leaves_field_unset() {
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("commonConf.clientId", ConfigValue::Null),
    ];

    let tree = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &no_params())
        .expect("injection should succeed");

    assert!(tree["commonConf"].get("clientId").is_none());
}

#[test]
fn test_parameters_expand_in_expandable_fields() {
    let mut params = BTreeMap::new();
    params.insert("BROKER_HOST".to_string(), ConfigValue::from("broker.local"));
    params.insert("BATCH".to_string(), ConfigValue::from(250i64));

    let configs = vec![
        Config::new("conf.fileInfos", ConfigValue::List(vec![file_info("/data/${BROKER_HOST}/in.log")])),
        Config::new("conf.batchSize", "${BATCH}"),
    ];

    let tree = ConfigInjector::new()
        .inject("filetail", &filetail_schema(), &configs, &params)
        .expect("injection should succeed");

    assert_eq!(tree["conf"]["fileInfos"][0]["fileFullPath"], json!("/data/broker.local/in.log"));
    assert_eq!(tree["conf"]["batchSize"], json!(250));
}

#[test]
fn test_parameters_do_not_expand_in_plain_fields() {
    let mut params = BTreeMap::new();
    params.insert("FORMAT".to_string(), ConfigValue::from("JSON"));
    let configs = vec![
        Config::new("commonConf.brokerUrl", "tcp://localhost:1883"),
        Config::new("publisherConf.dataFormat", "${FORMAT}"),
    ];

    let tree = ConfigInjector::new()
        .inject("mqtt", &mqtt_schema(), &configs, &params)
        .expect("injection should succeed");

    assert_eq!(tree["publisherConf"]["dataFormat"], json!("${FORMAT}"));
}

#[test]
fn test_expand_parameters_leaves_unknown_placeholders() {
    let mut params = BTreeMap::new();
    params.insert("ENV".to_string(), ConfigValue::from("prod"));

    let expanded = expand_parameters(&ConfigValue::from("${ENV}/${REGION}/logs"), &params);
    assert_eq!(expanded, ConfigValue::from("prod/${REGION}/logs"));

    let untouched = expand_parameters(&ConfigValue::from("${REGION}"), &params);
    assert_eq!(untouched, ConfigValue::from("${REGION}"));

    let unterminated = expand_parameters(&ConfigValue::from("${ENV"), &params);
    assert_eq!(unterminated, ConfigValue::from("${ENV"));
}

#[test]
fn test_injector_is_reusable() {
    let injector = ConfigInjector::new();
    let first = injector.inject(
        "a",
        &mqtt_schema(),
        &[Config::new("commonConf.brokerUrl", "tcp://a:1883")],
        &no_params(),
    );
    let second = injector.inject(
        "b",
        &mqtt_schema(),
        &[Config::new("commonConf.brokerUrl", "tcp://b:1883")],
        &no_params(),
    );

    assert_eq!(first.expect("first")["commonConf"]["brokerUrl"], json!("tcp://a:1883"));
    assert_eq!(second.expect("second")["commonConf"]["brokerUrl"], json!("tcp://b:1883"));
}
