use std::collections::HashMap;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use ena_portal_browser::config::{
    Config, ConfigLoader, ConfigOverrides, DEFAULT_API_URL_PREFIX, DEFAULT_CACHE_FILE,
};
use ena_portal_browser::error::PortalError;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<HashMap<_, _>>();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_without_environment() {
    let config = ConfigLoader::resolve_with(lookup(&[])).unwrap();
    assert_eq!(config.api_url_prefix, DEFAULT_API_URL_PREFIX);
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.cache_file, DEFAULT_CACHE_FILE);
}

#[test]
fn environment_overrides_defaults() {
    let config = ConfigLoader::resolve_with(lookup(&[
        ("API_URL_PREFIX", "http://localhost:9000/api"),
        ("timeout", "5"),
        ("ENA_CACHE_FILE", "/var/tmp/ena"),
    ]))
    .unwrap();
    assert_eq!(config.api_url_prefix, "http://localhost:9000/api");
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.state_path(), "/var/tmp/ena-state.json");
}

#[test]
fn bad_timeout_is_rejected() {
    let err = ConfigLoader::resolve_with(lookup(&[("TIMEOUT", "soon")])).unwrap_err();
    assert_matches!(err, PortalError::ConfigParse { key, .. } if key == "timeout");
}

#[test]
fn non_http_prefix_is_rejected() {
    let err = ConfigLoader::resolve_with(lookup(&[("API_URL_PREFIX", "ftp://ebi")])).unwrap_err();
    assert_matches!(err, PortalError::ConfigParse { .. });
}

#[test]
fn cli_overrides_win() {
    let config = ConfigLoader::apply_overrides(
        Config::default(),
        ConfigOverrides {
            api_url_prefix: None,
            timeout_secs: Some(2),
            cache_file: Some(Utf8PathBuf::from("state/.cache")),
        },
    );
    assert_eq!(config.api_url_prefix, DEFAULT_API_URL_PREFIX);
    assert_eq!(config.timeout, Duration::from_secs(2));
    assert_eq!(config.data_path(), "state/.cache-data.json");
}

#[test]
fn env_file_is_loaded() {
    let temp = tempfile::tempdir().unwrap();
    let env_file = temp.path().join("portal.env");
    std::fs::write(&env_file, "ENA_PB_TEST_ONLY_KEY=loaded\n").unwrap();

    ConfigLoader::resolve(Some(&env_file)).unwrap();
    assert_eq!(
        std::env::var("ENA_PB_TEST_ONLY_KEY").as_deref(),
        Ok("loaded")
    );
}
