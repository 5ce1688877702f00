// ABOUTME: Configuration precedence: TOML file values overridden by environment variables
// ABOUTME: Serialized because the tests mutate process environment

use bloomgen_core::{BloomgenConfig, ConfigManager, GenerationStrategy};
use serial_test::serial;
use std::path::PathBuf;

const VARS: &[&str] = &[
    "NEO4J_URI",
    "NEO4J_USERNAME",
    "NEO4J_PASSWORD",
    "GEMINI_API_KEY",
    "GEMINI_MODEL",
    "BLOOMGEN_LLM_PROVIDER",
    "BLOOMGEN_MODEL",
    "BLOOMGEN_STRATEGY",
    "BLOOMGEN_OUTPUT_DIR",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn file_values_survive_without_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bloomgen.toml");
    std::fs::write(
        &path,
        r#"
[neo4j]
uri = "bolt://graph.internal:7687"
username = "reader"

[generation]
strategy = "per-perspective"
output_dir = "perspectives"
min_perspectives = 2
max_perspectives = 3
"#,
    )
    .unwrap();

    let config = ConfigManager::read_toml_file(&path).unwrap();
    let config = ConfigManager::apply_env_overrides(config).unwrap();
    ConfigManager::validate_config(&config).unwrap();

    assert_eq!(config.neo4j.uri.as_deref(), Some("bolt://graph.internal:7687"));
    assert_eq!(config.generation.strategy, GenerationStrategy::PerPerspective);
    assert_eq!(config.generation.output_dir, PathBuf::from("perspectives"));
    assert_eq!(config.generation.max_perspectives, 3);
    assert_eq!(config.llm.provider, "gemini");
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    std::env::set_var("NEO4J_URI", "neo4j+s://abc.databases.neo4j.io");
    std::env::set_var("NEO4J_PASSWORD", "pw");
    std::env::set_var("GEMINI_API_KEY", "gemini-key");
    std::env::set_var("GEMINI_MODEL", "gemini-2.0-flash");
    std::env::set_var("BLOOMGEN_OUTPUT_DIR", "/tmp/bloom-out");

    let mut base = BloomgenConfig::default();
    base.neo4j.uri = Some("bolt://localhost:7687".to_string());
    let config = ConfigManager::apply_env_overrides(base).unwrap();
    clear_env();

    assert_eq!(config.neo4j.uri.as_deref(), Some("neo4j+s://abc.databases.neo4j.io"));
    assert_eq!(config.neo4j.password.as_deref(), Some("pw"));
    assert_eq!(config.llm.api_key.as_deref(), Some("gemini-key"));
    assert_eq!(config.llm.model.as_deref(), Some("gemini-2.0-flash"));
    assert_eq!(config.generation.output_dir, PathBuf::from("/tmp/bloom-out"));
}

#[test]
#[serial]
fn gemini_variables_ignored_for_other_providers() {
    clear_env();
    std::env::set_var("BLOOMGEN_LLM_PROVIDER", "ollama");
    std::env::set_var("GEMINI_MODEL", "gemini-2.0-flash");
    std::env::set_var("BLOOMGEN_MODEL", "qwen2.5:14b");

    let config = ConfigManager::apply_env_overrides(BloomgenConfig::default()).unwrap();
    clear_env();

    assert_eq!(config.llm.provider, "ollama");
    assert_eq!(config.llm.model.as_deref(), Some("qwen2.5:14b"));
}

#[test]
#[serial]
fn invalid_strategy_in_env_is_rejected() {
    clear_env();
    std::env::set_var("BLOOMGEN_STRATEGY", "whenever");
    let result = ConfigManager::apply_env_overrides(BloomgenConfig::default());
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn default_config_file_round_trips() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    ConfigManager::create_default_config(&path).unwrap();
    let config = ConfigManager::read_toml_file(&path).unwrap();

    assert_eq!(config.cache.schema_path, PathBuf::from("schema.json"));
    assert_eq!(config.cache.full_schema_path, PathBuf::from("schema_full.json"));
    assert!(ConfigManager::validate_config(&config).is_ok());
}
