// tests/config_env.rs
//
// AppConfig::load() against the real process environment. These tests mutate
// env vars, so they run serially.

use serial_test::serial;

use fb_rag_chatbot::config::{
    AppConfig, ENV_ALLOWED_ORIGINS, ENV_API_KEY, ENV_CONFIG_PATH, ENV_FB_ACCESS_TOKEN,
};

fn clear_env() {
    for k in [ENV_API_KEY, ENV_ALLOWED_ORIGINS, ENV_CONFIG_PATH, ENV_FB_ACCESS_TOKEN] {
        std::env::remove_var(k);
    }
}

#[test]
#[serial]
fn load_requires_api_key() {
    clear_env();
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains(ENV_API_KEY));
}

#[test]
#[serial]
fn load_reads_env_and_explicit_config_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("svc.toml");
    std::fs::write(&path, "[llm]\ntimeout_secs = 7\n").unwrap();

    std::env::set_var(ENV_API_KEY, "sk-live");
    std::env::set_var(ENV_FB_ACCESS_TOKEN, "fb-token");
    std::env::set_var(ENV_ALLOWED_ORIGINS, "https://app.example");
    std::env::set_var(ENV_CONFIG_PATH, &path);

    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.api_key, "sk-live");
    assert_eq!(cfg.fb_access_token.as_deref(), Some("fb-token"));
    assert_eq!(cfg.allowed_origins, vec!["https://app.example"]);
    assert_eq!(cfg.llm.timeout_secs, 7);
    clear_env();
}

#[test]
#[serial]
fn explicit_config_path_must_exist() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "k");
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains(ENV_CONFIG_PATH));
    clear_env();
}

#[test]
#[serial]
fn invalid_origin_is_rejected() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "k");
    std::env::set_var(ENV_ALLOWED_ORIGINS, "https://ok.example,bad\norigin");
    assert!(AppConfig::load().is_err());
    clear_env();
}
