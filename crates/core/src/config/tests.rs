//! Tests for configuration module

use super::*;
use crate::error::{Error, Result};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

fn create_temp_config_file(content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .map_err(|e| Error::config(format!("Failed to create temp file: {e}")))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::config(format!("Failed to write temp file: {e}")))?;
    file.flush()
        .map_err(|e| Error::config(format!("Failed to flush temp file: {e}")))?;
    Ok(file)
}

fn with_env_var<F, T>(key: &str, value: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    std::env::set_var(key, value);
    let result = f();
    std::env::remove_var(key);
    result
}

#[test]
fn test_default_values() {
    let config = Config::default();

    assert!(config.watch.root.ends_with(Path::new("knowledge_base/smb")));
    assert_eq!(config.watch.retry_attempts, 10);
    assert_eq!(config.watch.retry_delay_ms, 50);
    assert!(!config.watch.settle_on_modify);
    assert_eq!(config.exclusions.prefix_file, PathBuf::from("prefix.txt"));
    assert_eq!(config.exclusions.suffix_file, PathBuf::from("suffix.txt"));
    assert_eq!(config.exclusions.regex_file, PathBuf::from("reg.txt"));
    assert_eq!(config.debounce.quiet_period_ms, 5000);
    assert_eq!(config.debounce.reap_interval_ms, 5000);
    assert_eq!(config.debounce.dispatch_spacing_ms, 300);
    assert_eq!(config.delivery.endpoint, "http://127.0.0.1:80/smb_active");
    assert_eq!(config.delivery.timeout_secs, 20);
    assert!(config.delivery.accept_invalid_certs);
}

#[test]
fn test_from_toml_str_valid() {
    let toml = r#"
        [watch]
        root = "/srv/share"
        retry_attempts = 3

        [debounce]
        quiet_period_ms = 1500

        [delivery]
        endpoint = "https://reports.example.com/smb_active"
        accept_invalid_certs = false
    "#;

    let config = Config::from_toml_str(toml).expect("Failed to parse valid TOML");
    assert_eq!(config.watch.root, PathBuf::from("/srv/share"));
    assert_eq!(config.watch.retry_attempts, 3);
    assert_eq!(config.watch.retry_delay_ms, 50);
    assert_eq!(config.debounce.quiet_period_ms, 1500);
    assert_eq!(config.debounce.reap_interval_ms, 5000);
    assert_eq!(
        config.delivery.endpoint,
        "https://reports.example.com/smb_active"
    );
    assert!(!config.delivery.accept_invalid_certs);
}

#[test]
fn test_from_toml_str_empty_uses_defaults() {
    let config = Config::from_toml_str("").expect("Failed to parse empty TOML");
    assert_eq!(config.debounce.dispatch_spacing_ms, 300);
    assert_eq!(config.delivery.max_concurrent, 16);
}

#[test]
fn test_from_toml_str_invalid_syntax() {
    let toml = r#"
        [delivery
        endpoint = "http://localhost"
    "#;

    let result = Config::from_toml_str(toml);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Failed to parse TOML"));
}

#[test]
fn test_from_file_reads_sections() {
    let file = create_temp_config_file(
        r#"
        [exclusions]
        prefix_file = "/etc/fsreport/prefix.txt"

        [watch]
        retry_delay_ms = 125
    "#,
    )
    .expect("test setup failed");

    let config = Config::from_file(file.path()).expect("Failed to load config file");
    assert_eq!(
        config.exclusions.prefix_file,
        PathBuf::from("/etc/fsreport/prefix.txt")
    );
    assert_eq!(config.exclusions.suffix_file, PathBuf::from("suffix.txt"));
    assert_eq!(config.watch.retry_delay_ms, 125);
}

#[test]
fn test_from_file_missing_file_uses_defaults() {
    let config = Config::from_file(Path::new("/nonexistent/fsreport.toml"))
        .expect("missing file should fall back to defaults");
    assert_eq!(config.watch.retry_attempts, 10);
    assert!(config.watch.root.ends_with(Path::new("knowledge_base/smb")));
}

#[test]
fn test_load_explicit_missing_file_is_error() {
    let result = Config::load(Some(Path::new("/nonexistent/custom.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_env_override() {
    let file = create_temp_config_file(
        r#"
        [debounce]
        dispatch_spacing_ms = 100
    "#,
    )
    .expect("test setup failed");

    let config = with_env_var("FSREPORT_DEBOUNCE__DISPATCH_SPACING_MS", "750", || {
        Config::from_file(file.path())
    })
    .expect("Failed to load config with env override");

    assert_eq!(config.debounce.dispatch_spacing_ms, 750);
}

#[test]
fn test_with_overrides() {
    let config = Config::default().with_overrides(
        Some(PathBuf::from("/data/incoming")),
        Some("https://example.com/hook".to_string()),
    );
    assert_eq!(config.watch.root, PathBuf::from("/data/incoming"));
    assert_eq!(config.delivery.endpoint, "https://example.com/hook");

    let untouched = Config::default().with_overrides(None, None);
    assert_eq!(untouched.delivery.endpoint, "http://127.0.0.1:80/smb_active");
}

#[test]
fn test_validate_accepts_defaults() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_endpoint() {
    let mut config = Config::default();
    config.delivery.endpoint = "ftp://example.com".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("must start with http:// or https://"));

    config.delivery.endpoint = "   ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_rejects_zero_limits() {
    let mut config = Config::default();
    config.watch.retry_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.debounce.reap_interval_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.delivery.max_concurrent = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.delivery.queue_capacity = 0;
    assert!(config.validate().is_err());
}
