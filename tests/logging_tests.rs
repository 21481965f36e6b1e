use pvbridge::config::LoggingConfig;
use pvbridge::logging::{get_logger, init_logging, parse_log_level};

#[test]
fn init_logging_is_idempotent() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let cfg = LoggingConfig {
        file: tmp_dir.path().join("pvbridge.log").to_string_lossy().to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };
    assert!(init_logging(&cfg).is_ok());
    assert!(init_logging(&cfg).is_ok());
    get_logger("test").info("logging initialized twice");
}

#[test]
fn parse_levels_case_insensitive() {
    use tracing::Level;
    assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
    assert_eq!(parse_log_level(" Error ").unwrap(), Level::ERROR);
    assert!(parse_log_level("loud").is_err());
}
