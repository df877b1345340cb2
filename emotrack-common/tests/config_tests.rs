//! Unit tests for configuration and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate EMOTRACK_ROOT_FOLDER are marked with #[serial].

use emotrack_common::config::{
    default_root_folder, load_toml_config, resolve_root_folder, SharedConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, None);
    assert_eq!(resolved, default_root_folder());
    assert!(resolved.to_string_lossy().contains("emotrack"));
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("emotrack.toml");
    std::fs::write(&config_path, "root_folder = \"/from/toml\"\n").unwrap();

    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, Some(&config_path));
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(Some(Path::new("/from/cli")), ROOT_FOLDER_ENV, None);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_config_file_root_folder_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("emotrack.toml");
    std::fs::write(&config_path, "root_folder = \"/from/toml\"\nlog_level = \"debug\"\n").unwrap();

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, Some(&config_path));
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config: SharedConfig = load_toml_config(&dir.path().join("absent.toml")).unwrap();

    assert!(config.root_folder.is_none());
    assert!(config.log_level.is_none());
}

#[test]
fn test_malformed_config_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("emotrack.toml");
    std::fs::write(&config_path, "root_folder = [unterminated").unwrap();

    let result: emotrack_common::Result<SharedConfig> = load_toml_config(&config_path);
    assert!(matches!(result, Err(emotrack_common::Error::Config(_))));
}
