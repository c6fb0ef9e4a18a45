use fsreport_core::config::Config;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_load_full_config_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    write!(
        file,
        r#"
        [watch]
        root = "/srv/samba/share"
        retry_attempts = 20
        settle_on_modify = true

        [exclusions]
        prefix_file = "/etc/fsreport/prefix.txt"
        suffix_file = "/etc/fsreport/suffix.txt"
        regex_file = "/etc/fsreport/reg.txt"

        [debounce]
        quiet_period_ms = 2000
        reap_interval_ms = 1000
        dispatch_spacing_ms = 0

        [delivery]
        endpoint = "https://reports.internal/smb_active"
        timeout_secs = 5
        accept_invalid_certs = false
        queue_capacity = 500
        max_concurrent = 2
    "#
    )
    .unwrap();
    file.flush().unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    config.validate().unwrap();

    assert_eq!(config.watch.root, PathBuf::from("/srv/samba/share"));
    assert_eq!(config.watch.retry_attempts, 20);
    assert!(config.watch.settle_on_modify);
    assert_eq!(
        config.exclusions.regex_file,
        PathBuf::from("/etc/fsreport/reg.txt")
    );
    assert_eq!(config.debounce.quiet_period_ms, 2000);
    assert_eq!(config.debounce.reap_interval_ms, 1000);
    assert_eq!(config.delivery.endpoint, "https://reports.internal/smb_active");
    assert_eq!(config.delivery.timeout_secs, 5);
    assert!(!config.delivery.accept_invalid_certs);
    assert_eq!(config.delivery.queue_capacity, 500);
    assert_eq!(config.delivery.max_concurrent, 2);
}

#[test]
fn test_config_validation_zero_queue_size() {
    let mut config = Config::default();
    config.watch.event_queue_size = 0;

    let result = config.validate();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("event_queue_size"));
}

#[test]
fn test_config_validation_empty_root() {
    let mut config = Config::default();
    config.watch.root = PathBuf::new();

    assert!(config.validate().is_err());
}
