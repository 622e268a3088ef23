//! Tests for configuration loading and resolution
//!
//! Covers config-file priority order, TOML defaults, credential overrides
//! from the environment, and validation of required keys.
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests
//! that manipulate ESSEM_* variables are marked with #[serial].

use essem_common::config::{resolve_config_path, Config, CONFIG_ENV_VAR};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
[amqp]
host = "broker.example.org"
port = 5671
username = "essem"
password = "secret"
exchange = "essence-events"
queue = "essem-eh"
prefetch_count = 4

[amqp.routing]
essence_linked = "essence-linked"
essence_unlinked = "essence-unlinked"
object_deleted = "object-deleted"
get_metadata = "get-metadata"

[repository]
base_url = "https://repository.example.org/media"
username = "essem-api"
password = "repo-secret"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes())
        .expect("Should write config");
    file
}

fn clear_env() {
    env::remove_var(CONFIG_ENV_VAR);
    env::remove_var("ESSEM_AMQP_USERNAME");
    env::remove_var("ESSEM_AMQP_PASSWORD");
    env::remove_var("ESSEM_REPOSITORY_USERNAME");
    env::remove_var("ESSEM_REPOSITORY_PASSWORD");
}

#[test]
#[serial]
fn load_full_config() {
    clear_env();
    let file = write_config(FULL_CONFIG);

    let config = Config::load(Some(file.path())).expect("Should load config");

    assert_eq!(config.amqp.host, "broker.example.org");
    assert_eq!(config.amqp.port, 5671);
    assert_eq!(config.amqp.vhost, "/"); // default
    assert_eq!(config.amqp.prefetch_count, 4);
    assert_eq!(config.amqp.routing.essence_linked, "essence-linked");
    assert_eq!(config.amqp.routing.get_metadata, "get-metadata");
    assert_eq!(config.repository.base_url, "https://repository.example.org/media");
    // Health section absent: defaults apply
    assert_eq!(config.health.listen, "127.0.0.1:5760");
}

#[test]
#[serial]
fn defaults_apply_when_optional_keys_absent() {
    clear_env();
    let minimal = r#"
[amqp]
username = "essem"
password = "secret"
exchange = "essence-events"
queue = "essem-eh"

[amqp.routing]
essence_linked = "essence-linked"
essence_unlinked = "essence-unlinked"
object_deleted = "object-deleted"
get_metadata = "get-metadata"

[repository]
base_url = "https://repository.example.org/media"
username = "essem-api"
password = "repo-secret"
"#;
    let file = write_config(minimal);

    let config = Config::load(Some(file.path())).expect("Should load config");

    assert_eq!(config.amqp.host, "localhost");
    assert_eq!(config.amqp.port, 5672);
    assert_eq!(config.amqp.prefetch_count, 1);
}

#[test]
#[serial]
fn env_credentials_override_file() {
    clear_env();
    let file = write_config(FULL_CONFIG);

    env::set_var("ESSEM_AMQP_PASSWORD", "env-secret");
    env::set_var("ESSEM_REPOSITORY_PASSWORD", "env-repo-secret");

    let config = Config::load(Some(file.path())).expect("Should load config");

    assert_eq!(config.amqp.password, "env-secret");
    assert_eq!(config.amqp.username, "essem"); // untouched
    assert_eq!(config.repository.password, "env-repo-secret");

    clear_env();
}

#[test]
#[serial]
fn empty_required_key_is_rejected() {
    clear_env();
    let broken = FULL_CONFIG.replace("exchange = \"essence-events\"", "exchange = \"\"");
    let file = write_config(&broken);

    let result = Config::load(Some(file.path()));
    let message = result.expect_err("Empty exchange should fail").to_string();
    assert!(message.contains("amqp.exchange"));
}

#[test]
#[serial]
fn cli_path_wins_over_env_var() {
    clear_env();
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/env-config.toml");

    let cli = PathBuf::from("/nonexistent/cli-config.toml");
    let resolved = resolve_config_path(Some(cli.as_path())).expect("CLI path should resolve");
    assert_eq!(resolved, cli);

    clear_env();
}

#[test]
#[serial]
fn env_var_used_when_no_cli_path() {
    clear_env();
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/env-config.toml");

    let resolved = resolve_config_path(None).expect("Env path should resolve");
    assert_eq!(resolved, PathBuf::from("/nonexistent/env-config.toml"));

    clear_env();
}

#[test]
#[serial]
fn missing_config_file_is_a_config_error() {
    clear_env();
    let result = Config::load(Some(std::path::Path::new("/nonexistent/essem.toml")));
    let message = result.expect_err("Missing file should fail").to_string();
    assert!(message.contains("Cannot read config file"));
}
