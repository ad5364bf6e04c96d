use anyhow::Result;
use std::fs;
use tempfile::TempDir;
use terminus::config::{Config, MissPolicy};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.assistant.model, "gemini-2.5-flash-preview-05-20");
    assert_eq!(
        config.assistant.base_url,
        "https://generativelanguage.googleapis.com/v1beta"
    );
    assert_eq!(config.assistant.timeout_secs, 30);
    assert_eq!(config.assistant.miss_policy, MissPolicy::Assistant);

    assert_eq!(config.markdown.throttle_ms, 120);
    assert!(config.markdown.default_enabled);

    assert_eq!(config.timings.open_post_ms, 500);
    assert_eq!(config.timings.navigate_ms, 800);
    assert_eq!(config.timings.reboot_ms, 1500);
    assert_eq!(config.timings.shutdown_ms, 2000);
    assert_eq!(config.timings.sudo_ms, 2000);
    assert_eq!(config.timings.banner_fade_ms, 300);
    assert_eq!(config.timings.typewriter_ms, 30);

    assert!(config.site.content_path.is_none());
    assert!(config.site.browser_command.is_none());
}

#[test]
fn test_missing_file_gives_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let config = Config::load_from(&dir.path().join("absent.toml"))?;
    assert_eq!(config.assistant.timeout_secs, 30);
    Ok(())
}

#[test]
fn test_save_and_load_roundtrip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.assistant.model = "gemini-custom".to_string();
    config.assistant.miss_policy = MissPolicy::Suggest;
    config.site.browser_command = Some("xdg-open".to_string());
    config.save_to(&path)?;

    let raw = fs::read_to_string(&path)?;
    assert!(raw.contains("[assistant]"));
    assert!(raw.contains("miss_policy = \"suggest\""));

    let loaded = Config::load_from(&path)?;
    assert_eq!(loaded.assistant.model, "gemini-custom");
    assert_eq!(loaded.assistant.miss_policy, MissPolicy::Suggest);
    assert_eq!(loaded.site.browser_command.as_deref(), Some("xdg-open"));
    Ok(())
}

#[test]
fn test_partial_file_fills_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[markdown]\nthrottle_ms = 250\n\n[site]\nbase_url = \"https://example.com/\"\n",
    )?;

    let config = Config::load_from(&path)?;
    assert_eq!(config.markdown.throttle_ms, 250);
    assert!(config.markdown.default_enabled);
    assert_eq!(config.assistant.timeout_secs, 30);
    assert_eq!(config.site.base_url.as_deref(), Some("https://example.com/"));
    Ok(())
}

#[test]
fn test_invalid_file_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[assistant\nmodel = ")?;
    assert!(Config::load_from(&path).is_err());
    Ok(())
}

#[test]
fn test_miss_policy_from_str() {
    assert_eq!("assistant".parse::<MissPolicy>(), Ok(MissPolicy::Assistant));
    assert_eq!("Suggest".parse::<MissPolicy>(), Ok(MissPolicy::Suggest));
    assert!("sometimes".parse::<MissPolicy>().is_err());
}
