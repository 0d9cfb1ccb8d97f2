use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use wablast_rs::cli::Cli;
use wablast_rs::{Config, InvalidNumberPolicy};

#[test]
fn default_config_round_trips() {
    let config = Config::default();
    let json = serde_json::to_string_pretty(&config).expect("serialize config");
    let decoded: Config = serde_json::from_str(&json).expect("deserialize config");
    assert_eq!(decoded, config);
}

#[test]
fn partial_config_keeps_defaults_for_omitted_fields() {
    let config: Config =
        serde_json::from_str(r#"{"max_retries": 1}"#).expect("deserialize config");
    assert_eq!(config.max_retries, 1);
    assert_eq!(config.chat_timeout_secs, 45);
    assert_eq!(config.invalid_number_policy, InvalidNumberPolicy::FailFast);
}

#[test]
fn jsonc_comments_are_accepted() {
    let mut file = tempfile::Builder::new()
        .suffix(".jsonc")
        .tempfile()
        .expect("temp config");
    file.write_all(
        br#"{
  // send more slowly than the default
  "contact_pause_secs": 10,
  "invalid_number_policy": "retry",
}"#,
    )
    .expect("write config");

    let config = Config::load(Some(file.path())).expect("load config");
    assert_eq!(config.contact_pause_secs, 10);
    assert_eq!(config.invalid_number_policy, InvalidNumberPolicy::Retry);
}

#[test]
fn explicit_missing_config_file_errors() {
    assert!(Config::load(Some(Path::new("/nonexistent/config.jsonc"))).is_err());
}

#[test]
fn cli_flags_override_config_values() {
    let cli = Cli::parse_from([
        "wablast-rs",
        "--contacts",
        "clients.csv",
        "--max-retries",
        "5",
        "--retry-invalid",
    ]);

    let mut config = Config::default();
    config.apply_cli(&cli);

    assert_eq!(config.contacts_file, PathBuf::from("clients.csv"));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.invalid_number_policy, InvalidNumberPolicy::Retry);
    // untouched values keep their defaults
    assert_eq!(config.image_file, PathBuf::from("image.png"));
}
