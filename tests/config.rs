use clap::Parser;
use roll_tracker::config::{parse_interval, AppConfig, Cli, Command, Toggle};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn builds_config_from_flags() {
    let cli = Cli::try_parse_from([
        "roll_tracker",
        "--owner",
        " u1 ",
        "--store",
        "data/positions.json",
        "--cache-ttl",
        "30s",
        "--cache-capacity",
        "16",
        "--provider-url",
        "http://localhost:9000",
        "show",
    ])
    .unwrap();
    assert!(matches!(cli.command, Command::Show));

    let config = AppConfig::from_cli(&cli).unwrap();
    assert_eq!(config.owner.as_str(), "u1");
    assert_eq!(config.store_path, PathBuf::from("data/positions.json"));
    assert_eq!(config.cache_ttl, Duration::from_secs(30));
    assert_eq!(config.cache_capacity, 16);
    assert_eq!(config.provider_url, "http://localhost:9000");

    let logged = serde_json::to_value(&config).unwrap();
    assert_eq!(logged["cache_ttl"], "30s");
    assert!(logged.get("provider_api_key").is_none());
    assert!(logged.get("telegram_bot_token").is_none());
}

#[test]
fn rejects_blank_owner_and_bad_ttl() {
    let blank = Cli::try_parse_from(["roll_tracker", "--owner", "  ", "show"]).unwrap();
    assert!(AppConfig::from_cli(&blank).is_err());

    let bad_ttl =
        Cli::try_parse_from(["roll_tracker", "--owner", "u1", "--cache-ttl", "soon", "show"])
            .unwrap();
    assert!(AppConfig::from_cli(&bad_ttl).is_err());
}

#[test]
fn parses_subcommand_arguments() {
    let cli = Cli::try_parse_from(["roll_tracker", "alerts", "ACME", "off"]).unwrap();
    match cli.command {
        Command::Alerts { ticker, state } => {
            assert_eq!(ticker, "ACME");
            assert_eq!(state, Toggle::Off);
        }
        other => panic!("unexpected command {other:?}"),
    }

    let cli = Cli::try_parse_from([
        "roll_tracker",
        "add",
        "ACME",
        "--strike",
        "110",
        "--expiry",
        "2027-01",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Command::Add { strike: Some(ref s), expiry: Some(ref e), .. } if s == "110" && e == "2027-01"
    ));
}

#[test]
fn interval_must_be_positive() {
    assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
    assert!(parse_interval("0s").is_err());
    assert!(parse_interval("later").is_err());
}
