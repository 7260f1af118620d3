//! BehaviorConfig: JSON загрузка и валидация

use wildlife_simulation::{BehaviorConfig, ConfigError};

#[test]
fn test_partial_json_keeps_deer_defaults() {
    let json = r#"{ "fsm": { "flee_speed": 11.0 }, "wounds": { "count_flesh_wounds": true } }"#;
    let config = BehaviorConfig::from_json_str(json).expect("valid config");

    assert_eq!(config.fsm.flee_speed, 11.0);
    assert!(config.wounds.count_flesh_wounds);
    assert_eq!(config.fsm.walk_speed, BehaviorConfig::deer().fsm.walk_speed);
    assert_eq!(config.navigation, BehaviorConfig::deer().navigation);
}

#[test]
fn test_deer_profile_is_valid_and_round_trips() {
    let deer = BehaviorConfig::deer();
    assert!(deer.validate().is_ok());

    let json = serde_json::to_string(&deer).expect("serializable");
    assert_eq!(BehaviorConfig::from_json_str(&json).expect("parses back"), deer);
}

#[test]
fn test_invalid_values_are_rejected_with_field_name() {
    let json = r#"{ "fsm": { "flee_distance": 80.0, "alert_distance": 55.0 } }"#;
    match BehaviorConfig::from_json_str(json) {
        Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "fsm.flee_distance"),
        other => panic!("expected Invalid, got {:?}", other),
    }

    let json = r#"{ "navigation": { "stuck_history_capacity": 1 } }"#;
    assert!(matches!(
        BehaviorConfig::from_json_str(json),
        Err(ConfigError::Invalid { field: "navigation.stuck_history_capacity", .. })
    ));

    let json = r#"{ "navigation": { "trail_probability": 1.5 } }"#;
    assert!(matches!(
        BehaviorConfig::from_json_str(json),
        Err(ConfigError::Invalid { field: "navigation.trail_probability", .. })
    ));
}

#[test]
fn test_malformed_json_is_parse_error() {
    assert!(matches!(
        BehaviorConfig::from_json_str("{ fsm: "),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = BehaviorConfig::load("/definitely/not/here/deer.json");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
