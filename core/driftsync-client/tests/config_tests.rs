use driftsync_client::{ClientConfig, ConfigError};
use std::path::PathBuf;

fn full_config() -> ClientConfig {
    ClientConfig {
        sync_dir: PathBuf::from("/data/sync"),
        conn: None,
        conn_host: Some("sync.example.net".to_string()),
        conn_port: Some(9400),
        conn_user: Some("alice".to_string()),
        conn_pass: Some("hunter2".to_string()),
        key: None,
    }
}

#[test]
fn complete_config_validates() {
    assert!(full_config().validate().is_ok());
}

#[test]
fn absent_conn_means_sock() {
    let config = full_config();
    let params = config.sock_params().unwrap();
    assert_eq!("sync.example.net", params.host);
    assert_eq!(9400, params.port);
    assert_eq!("alice", params.user);
    assert_eq!("hunter2", params.pass);
}

#[test]
fn explicit_sock_is_accepted() {
    let mut config = full_config();
    config.conn = Some("sock".to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn empty_sync_dir_is_missing() {
    let mut config = full_config();
    config.sync_dir = PathBuf::new();
    assert_eq!(Err(ConfigError::Missing("sync_dir")), config.validate());
}

#[test]
fn relative_sync_dir_is_rejected() {
    let mut config = full_config();
    config.sync_dir = PathBuf::from("relative/dir");
    assert_eq!(Err(ConfigError::RelativeSyncDir), config.validate());
}

#[test]
fn missing_sock_parameters_are_rejected() {
    let mut config = full_config();
    config.conn_host = None;
    assert_eq!(Err(ConfigError::Missing("conn_host")), config.validate());

    let mut config = full_config();
    config.conn_port = None;
    assert_eq!(Err(ConfigError::Missing("conn_port")), config.validate());

    let mut config = full_config();
    config.conn_user = None;
    assert_eq!(Err(ConfigError::Missing("conn_user")), config.validate());

    let mut config = full_config();
    config.conn_pass = None;
    assert_eq!(Err(ConfigError::Missing("conn_pass")), config.validate());
}

#[test]
fn unknown_connector_is_rejected() {
    let mut config = full_config();
    config.conn = Some("carrier-pigeon".to_string());
    assert_eq!(
        Err(ConfigError::UnknownConnector("carrier-pigeon".to_string())),
        config.validate()
    );
}

#[test]
fn deserializes_from_json_shape() {
    // The agent parses TOML; the serde shape is the same either way.
    let config: ClientConfig = serde_json::from_str(
        r#"{
            "sync_dir": "/home/alice/sync",
            "conn_host": "localhost",
            "conn_port": 9400,
            "conn_user": "alice",
            "conn_pass": "secret",
            "key": "shared secret"
        }"#,
    )
    .unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(Some("shared secret".to_string()), config.key);
}
