use std::{env, path::PathBuf};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `MOODTUNE__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("MOODTUNE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("engine.extra_args"),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.player.poll_interval_ms == 0 {
            return Err("player.poll_interval_ms must be >= 1".to_string());
        }
        if self.player.ready_timeout_ms == 0 {
            return Err("player.ready_timeout_ms must be >= 1".to_string());
        }
        if self.player.default_volume > 100 {
            return Err("player.default_volume must be <= 100".to_string());
        }
        if self.controls.volume_step == 0 {
            return Err("controls.volume_step must be >= 1".to_string());
        }
        if !self.engine.url_template.contains("{id}") {
            return Err("engine.url_template must contain `{id}`".to_string());
        }
        Ok(())
    }

    /// Render the settings as a TOML document (used for `--print-config`).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Resolve the config path from `MOODTUNE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("MOODTUNE_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/moodtune/config.toml`
/// or `~/.config/moodtune/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("moodtune").join("config.toml"))
}

/// Default log file under `$XDG_STATE_HOME/moodtune/` or `~/.local/state/moodtune/`.
pub fn default_log_path() -> Option<PathBuf> {
    let state_home = if let Some(xdg) = env::var_os("XDG_STATE_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
    };

    state_home.map(|d| d.join("moodtune").join("moodtune.log"))
}
