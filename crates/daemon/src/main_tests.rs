use super::*;

#[test]
fn defaults_match_the_documented_flags() {
    let cli = Cli::try_parse_from(["scd"]).unwrap();
    assert_eq!(cli.preload, 0);
    assert_eq!(cli.user, 0);
    assert!(cli.shutdown);
    assert_eq!(cli.timeout, 2);
    assert!(cli.manifests.is_none());
    assert!(cli.bridge.is_none());
    assert!(cli.root.is_none());
}

#[test]
fn root_accepts_a_path_value() {
    let cli = Cli::try_parse_from(["scd", "--root", "/var/lib/sc"]).unwrap();
    assert_eq!(cli.root, Some(PathBuf::from("/var/lib/sc")));
}

#[test]
fn shutdown_accepts_an_explicit_boolean_value() {
    let cli = Cli::try_parse_from(["scd", "--shutdown", "false"]).unwrap();
    assert!(!cli.shutdown);

    let cli = Cli::try_parse_from(["scd", "--shutdown", "true"]).unwrap();
    assert!(cli.shutdown);
}

#[test]
fn preload_and_timeout_parse_as_integers() {
    let cli = Cli::try_parse_from(["scd", "--preload", "3", "--timeout", "10"]).unwrap();
    assert_eq!(cli.preload, 3);
    assert_eq!(cli.timeout, 10);
}

#[test]
fn manifests_and_bridge_accept_string_values() {
    let cli =
        Cli::try_parse_from(["scd", "--manifests", "/etc/sc/manifests", "--bridge", "sc-br1"])
            .unwrap();
    assert_eq!(cli.manifests, Some(PathBuf::from("/etc/sc/manifests")));
    assert_eq!(cli.bridge, Some("sc-br1".to_string()));
}

#[test]
fn an_unknown_flag_is_a_usage_error() {
    let err = Cli::try_parse_from(["scd", "--not-a-flag"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
}

#[test]
fn a_non_boolean_shutdown_value_is_a_usage_error() {
    let err = Cli::try_parse_from(["scd", "--shutdown", "maybe"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
}

#[test]
fn help_and_version_are_reported_as_display_errors() {
    let err = Cli::try_parse_from(["scd", "--help"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);

    let err = Cli::try_parse_from(["scd", "--version"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
}

#[test]
fn log_rotation_is_a_no_op_below_the_size_threshold() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("daemon.log");
    std::fs::write(&log_path, b"small").unwrap();

    rotate_log_if_needed(&log_path);

    assert!(log_path.exists());
    assert!(!dir.path().join("daemon.log.1").exists());
}

#[test]
fn log_rotation_shifts_the_current_file_once_oversized() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("daemon.log");
    std::fs::write(&log_path, vec![0u8; (MAX_LOG_SIZE + 1) as usize]).unwrap();

    rotate_log_if_needed(&log_path);

    assert!(!log_path.exists());
    assert!(dir.path().join("daemon.log.1").exists());
}
