//! End-to-end configuration loading: JSON in, validated StudyConfig out.

use proband_core::{validate, Condition, ConfigError, StudyConfig};

fn two_arm_config() -> serde_json::Value {
    serde_json::json!({
        "page_list": [
            { "name": "Consent", "path": "consent" },
            { "name": "Demographics", "path": "questionnaire/demographics" },
            { "conditional_routing": [
                { "condition": 1, "page_list": [
                    { "name": "Task", "path": "task/easy" },
                    { "name": "Mood", "path": "questionnaire/mood/post" }
                ] },
                { "condition": 2, "page_list": [
                    { "name": "Task", "path": "task/hard" },
                    { "name": "Mood", "path": "questionnaire/mood/post" }
                ] }
            ] },
            { "name": "End", "path": "end" }
        ],
        "conditions": [
            { "label": "Easy" },
            { "label": "Hard" }
        ]
    })
}

#[test]
fn loads_and_validates_a_realistic_config() {
    let config = StudyConfig::from_json(&two_arm_config()).unwrap();
    validate(&config).unwrap();

    let arm1: Vec<&str> = config
        .pages
        .flatten(Condition::arm(1))
        .iter()
        .map(|p| p.path.as_str())
        .collect();
    assert_eq!(
        arm1,
        vec![
            "consent",
            "questionnaire/demographics",
            "task/easy",
            "questionnaire/mood/post",
            "end"
        ]
    );

    // The shared post-task questionnaire is reported once even though both
    // arms administer it.
    assert_eq!(
        config.questionnaire_paths(true),
        vec!["demographics", "mood/post"]
    );
    assert!(!config.has_duplicate_questionnaires());
}

#[test]
fn union_flattening_covers_every_branch() {
    let config = StudyConfig::from_json(&two_arm_config()).unwrap();
    let union: Vec<&str> = config
        .pages
        .flatten(Condition::NONE)
        .iter()
        .map(|p| p.path.as_str())
        .collect();
    assert!(union.contains(&"task/easy"));
    assert!(union.contains(&"task/hard"));
}

#[test]
fn shape_errors_surface_with_context() {
    let bad = serde_json::json!({
        "page_list": [ { "conditional_routing": [ { "condition": 1 } ] } ]
    });
    let err = StudyConfig::from_json(&bad).unwrap_err();
    match err {
        ConfigError::Malformed { context, .. } => {
            assert!(context.contains("conditional_routing"), "context: {}", context);
        }
        other => panic!("expected a Malformed error, got {:?}", other),
    }
}

#[test]
fn validation_rejects_disabled_study() {
    let mut value = two_arm_config();
    value["conditions"] = serde_json::json!([
        { "label": "Easy", "enabled": false },
        { "label": "Hard", "enabled": false }
    ]);
    let config = StudyConfig::from_json(&value).unwrap();
    assert_eq!(validate(&config), Err(ConfigError::NoEnabledArms { arms: 2 }));
}
