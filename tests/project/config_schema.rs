use onboard_relay::config::Config;
use onboard_relay::detector::PersistOrder;
use onboard_relay::directory::ModuleVersion;
use onboard_relay::notify::StrategyName;
use std::path::PathBuf;

#[test]
fn full_config_deserializes() {
    let toml = r#"
[slack]
bot_token = "xoxb-abc"
fallback_channel = "C-onboarding"
api_base = "https://slack.internal/api"
conversation_page_size = 100
max_conversation_pages = 5
strategies = ["direct", "broadcast"]

[github]
token = "ghp_abc"
per_page = 50
include_forks = false

[reliability]
rate_limit_attempts = 3
rate_limit_backoff_ms = 1000

[detector]
state_dir = "/srv/relay"
persist_order = "after_notify"

[directory]
program = "dir-cli"
module_version = "v1"
server = "vc01.example.com"
admin_user = "administrator"
domain = "corp.local"
default_group = "staff"
"#;

    let parsed: Config = toml::from_str(toml).expect("config should deserialize");

    assert_eq!(parsed.slack.max_conversation_pages, 5);
    assert_eq!(
        parsed.slack.strategies,
        vec![StrategyName::Direct, StrategyName::Broadcast]
    );
    assert!(!parsed.github.include_forks);
    assert!(!parsed.github.include_archived);
    assert_eq!(parsed.reliability.rate_limit_attempts, 3);
    assert_eq!(parsed.detector.persist_order, PersistOrder::AfterNotify);
    assert!(parsed.detector.audit);
    assert_eq!(parsed.state_dir(), PathBuf::from("/srv/relay"));
    assert_eq!(parsed.directory.module_version, ModuleVersion::V1);
    assert_eq!(parsed.directory.default_group.as_deref(), Some("staff"));
    parsed.validate().expect("config should validate");
}

#[test]
fn unknown_strategy_is_rejected() {
    let toml = r#"
[slack]
strategies = ["direct", "carrier-pigeon"]
"#;
    assert!(toml::from_str::<Config>(toml).is_err());
}

#[test]
fn tilde_state_dir_expands_to_home() {
    let config = Config::default();
    let state_dir = config.state_dir();
    assert!(!state_dir.to_string_lossy().starts_with('~'));
    assert!(state_dir.ends_with(".onboard-relay/state"));
}
