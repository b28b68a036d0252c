use growth_score::config::{GrowthConfig, RegistryPreset};
use growth_score::{GrowthEngine, RawRecord, RecordSet};
use std::io::Write;
use std::sync::Arc;
use tempfile::Builder;

#[test]
fn test_load_yaml_file() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "active_cutoff: 6\ncutoff_choices: [2, 6, 10]\nparallel: true").unwrap();

    let config = GrowthConfig::from_path(file.path()).unwrap();
    assert_eq!(config.active_cutoff, 6);
    assert_eq!(config.cutoff_choices, vec![2, 6, 10]);
    assert!(config.parallel);
    assert_eq!(config.preset, RegistryPreset::Broadcast);
}

#[test]
fn test_load_json_file() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"preset": "digital", "active_cutoff": 2}}"#).unwrap();

    let config = GrowthConfig::from_path(file.path()).unwrap();
    assert_eq!(config.preset, RegistryPreset::Digital);
    assert_eq!(config.registry().unwrap().names(), vec!["Views", "Buzz"]);
}

#[test]
fn test_missing_and_invalid_files() {
    let dir = tempfile::tempdir().unwrap();
    let err = GrowthConfig::from_path(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read growth config"));

    let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
    writeln!(file, "cutoff_choices: [0, 4]").unwrap();
    let err = GrowthConfig::from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("Invalid growth config"));
}

#[test]
fn test_engine_from_config() {
    let yaml = r#"
parallel: true
metrics:
  - display_name: Rating
    source_key: rating
    aggregation: mean
"#;
    let config = GrowthConfig::from_yaml_str(yaml).unwrap();
    let records = RecordSet::new(vec![
        RawRecord::new("a", "rating", 1, 2.0),
        RawRecord::new("a", "rating", 2, 4.0),
        RawRecord::new("b", "rating", 1, 1.0),
    ]);
    let engine = GrowthEngine::from_config(Arc::new(records), &config).unwrap();
    let pop = engine.population();
    let report = engine
        .report(&pop, "a", config.active().unwrap(), &config.cutoffs().unwrap())
        .unwrap();
    assert_eq!(report.evolution.len(), 1);
    assert_eq!(report.active.row("a").unwrap().composite_grade.as_deref(), Some("S"));
}

#[test]
fn test_from_env_overrides() {
    std::env::set_var("GROWTH_ACTIVE_CUTOFF", "8");
    std::env::set_var("GROWTH_CUTOFFS", "4, 8,12");
    std::env::set_var("GROWTH_PRESET", "digital");
    let config = GrowthConfig::from_env().unwrap();
    std::env::remove_var("GROWTH_ACTIVE_CUTOFF");
    std::env::remove_var("GROWTH_CUTOFFS");
    std::env::remove_var("GROWTH_PRESET");

    assert_eq!(config.active_cutoff, 8);
    assert_eq!(config.cutoff_choices, vec![4, 8, 12]);
    assert_eq!(config.preset, RegistryPreset::Digital);
}
