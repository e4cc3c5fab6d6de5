// tests/config_env.rs
use deal_notifier::dedup::DedupStrategy;
use deal_notifier::AppConfig;
use std::{env, fs};

const VARS: &[&str] = &[
    "DEALS_CONFIG_PATH",
    "SITE_URL",
    "AUTH_TOKEN",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "DEDUP_STRATEGY",
    "STATE_KEY",
    "DRY_RUN",
];

fn clear_env() {
    for v in VARS {
        env::remove_var(v);
    }
}

#[serial_test::serial]
#[test]
fn load_uses_file_then_env() {
    // Isolate CWD so the repo's own config/ is never read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    clear_env();

    // 1) Nothing configured → SITE_URL missing
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("SITE_URL"));

    // 2) Fallback TOML in ./config/
    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/deals.toml",
        r#"
site_url = "https://deals.test/"
[telegram]
bot_token = "t"
chat_id = "-100"
[store]
strategy = "set"
"#,
    )
    .unwrap();
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.site_url, "https://deals.test/");
    assert_eq!(cfg.store.strategy, DedupStrategy::Set);

    // 3) Env wins over the file
    env::set_var("DEDUP_STRATEGY", "cursor");
    env::set_var("AUTH_TOKEN", "secret");
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.store.strategy, DedupStrategy::Cursor);
    assert_eq!(cfg.auth_token.as_deref(), Some("secret"));

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn explicit_path_must_exist() {
    clear_env();
    env::set_var("DEALS_CONFIG_PATH", "/definitely/not/here.toml");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("DEALS_CONFIG_PATH"));
    clear_env();
}
