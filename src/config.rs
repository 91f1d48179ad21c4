use crate::normalize::{ReplacementRule, ReplacementTable, TextNormalizer};
use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const CONFIG_DIR_NAME: &str = "physchat";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    pub enabled: bool,
    pub table: ReplacementTable,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            table: ReplacementTable::physics(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFileConfig {
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    normalizer: Option<RawNormalizerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNormalizerConfig {
    enabled: Option<bool>,
    rules: Option<Vec<RawRule>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    pattern: String,
    replacement: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    /// Loads config from `explicit_path`, or from the discovered default
    /// location when `None`. An explicit path must point at an existing file.
    pub fn load_with_path(explicit_path: Option<&Path>) -> Result<Self> {
        let config_path = match explicit_path {
            Some(path) => {
                if !path.is_file() {
                    bail!(
                        "Failed to load config {}: file does not exist",
                        path.display()
                    );
                }
                path.to_path_buf()
            }
            None => discover_config_path()?,
        };
        let file_config = load_file_config(&config_path)?;

        dotenvy::dotenv().ok();

        let file_api_key = file_config
            .as_ref()
            .and_then(|cfg| cfg.gemini_api_key.as_ref())
            .and_then(|value| non_empty(value).map(ToOwned::to_owned));
        let file_model = file_config
            .as_ref()
            .and_then(|cfg| cfg.gemini_model.as_ref())
            .and_then(|value| non_empty(value).map(ToOwned::to_owned));
        let file_base_url = file_config
            .as_ref()
            .and_then(|cfg| cfg.gemini_base_url.as_ref())
            .and_then(|value| non_empty(value).map(ToOwned::to_owned));

        let normalizer = validate_normalizer(
            file_config.as_ref().and_then(|cfg| cfg.normalizer.as_ref()),
            &config_path,
        )?;

        Ok(Self {
            config_path,
            gemini_api_key: env_non_empty("GEMINI_API_KEY").or(file_api_key),
            gemini_model: env_non_empty("GEMINI_MODEL")
                .or(file_model)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: env_non_empty("GEMINI_BASE_URL")
                .or(file_base_url)
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            normalizer,
        })
    }

    pub fn text_normalizer(&self) -> TextNormalizer {
        TextNormalizer::new(self.normalizer.table.clone())
    }
}

fn discover_config_path() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if trimmed.is_empty() {
            bail!("Failed to resolve config path: XDG_CONFIG_HOME is set but empty");
        }

        return Ok(PathBuf::from(trimmed)
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow!("Failed to resolve config path: HOME directory is unavailable"))?;

    Ok(home
        .join(".config")
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME))
}

fn load_file_config(config_path: &Path) -> Result<Option<RawFileConfig>> {
    if !config_path.is_file() {
        return Ok(None);
    }

    let config_text = fs::read_to_string(config_path).map_err(|err| {
        anyhow!(
            "Failed to load config {}: unable to read file: {err}",
            config_path.display()
        )
    })?;

    toml::from_str(&config_text)
        .map(Some)
        .map_err(|err| anyhow!("Failed to load config {}: {err}", config_path.display()))
}

fn validate_normalizer(
    raw: Option<&RawNormalizerConfig>,
    config_path: &Path,
) -> Result<NormalizerConfig> {
    let mut config = NormalizerConfig::default();
    let Some(raw) = raw else {
        return Ok(config);
    };

    if let Some(enabled) = raw.enabled {
        config.enabled = enabled;
    }

    if let Some(rules) = &raw.rules {
        let extra = rules
            .iter()
            .map(|rule| ReplacementRule::new(rule.pattern.clone(), rule.replacement.clone()))
            .collect();
        config.table.extend(extra).map_err(|err| {
            config_error(
                config_path,
                &format!("normalizer.rules[{}]", err.index()),
                &err.to_string(),
            )
        })?;
    }

    Ok(config)
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn config_error(config_path: &Path, key_path: &str, reason: &str) -> anyhow::Error {
    anyhow!(
        "Failed to load config {}: {key_path}: {reason}",
        config_path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, NormalizerConfig};
    use crate::normalize::ReplacementTable;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn reset_vars() {
        unsafe {
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("GEMINI_MODEL");
            env::remove_var("GEMINI_BASE_URL");
            env::remove_var("XDG_CONFIG_HOME");
        }
    }

    fn with_cwd<T>(path: &Path, f: impl FnOnce() -> T) -> T {
        let cwd = env::current_dir().expect("current dir");
        env::set_current_dir(path).expect("set current dir");
        let result = f();
        env::set_current_dir(cwd).expect("restore current dir");
        result
    }

    fn write_default_config(root: &Path, contents: &str) -> PathBuf {
        let config_dir = root.join("physchat");
        fs::create_dir_all(&config_dir).expect("create config dir");
        let path = config_dir.join("config.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    fn load_from_xdg(root: &Path) -> anyhow::Result<AppConfig> {
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", root);
        }
        with_cwd(root, AppConfig::load)
    }

    #[test]
    #[serial]
    fn load_uses_defaults_when_nothing_is_configured() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_xdg(tmp.path()).expect("load config");

        assert_eq!(cfg.gemini_api_key, None);
        assert_eq!(cfg.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(cfg.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(cfg.normalizer, NormalizerConfig::default());
        assert_eq!(
            cfg.config_path,
            tmp.path().join("physchat").join("config.toml")
        );
    }

    #[test]
    #[serial]
    fn load_env_overrides_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
gemini_api_key = "file_key"
gemini_model = "file_model"
gemini_base_url = "https://example.com"
"#,
        );

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("GEMINI_API_KEY", "os_key");
            env::set_var("GEMINI_MODEL", "os_model");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("os_key"));
        assert_eq!(cfg.gemini_model, "os_model");
        assert_eq!(cfg.gemini_base_url, "https://example.com");
    }

    #[test]
    #[serial]
    fn load_does_not_override_existing_os_env_with_dotenv() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(
            tmp.path().join(".env"),
            "GEMINI_API_KEY=file_key\nGEMINI_MODEL=file_model\n",
        )
        .expect("write env file");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", tmp.path());
            env::set_var("GEMINI_API_KEY", "os_key");
            env::set_var("GEMINI_MODEL", "os_model");
        }

        let cfg = with_cwd(tmp.path(), || AppConfig::load().expect("load config"));
        assert_eq!(cfg.gemini_api_key.as_deref(), Some("os_key"));
        assert_eq!(cfg.gemini_model, "os_model");
    }

    #[test]
    #[serial]
    fn load_ignores_blank_file_values() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "gemini_api_key = \"  \"\ngemini_model = \"\"\n");

        let cfg = load_from_xdg(tmp.path()).expect("load config");
        assert_eq!(cfg.gemini_api_key, None);
        assert_eq!(cfg.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    #[serial]
    fn load_fails_when_xdg_config_home_is_empty() {
        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "   ");
        }

        let err = AppConfig::load().expect_err("load should fail");
        assert!(
            err.to_string()
                .contains("Failed to resolve config path: XDG_CONFIG_HOME is set but empty")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_root_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(tmp.path(), "unknown_key = 1");

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");
        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    #[serial]
    fn load_with_explicit_path_skips_discovery() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "gemini_model = \"custom_model\"\n").expect("write config");

        reset_vars();
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "   ");
        }

        let cfg = with_cwd(tmp.path(), || {
            AppConfig::load_with_path(Some(&path)).expect("load config")
        });
        assert_eq!(cfg.gemini_model, "custom_model");
        assert_eq!(cfg.config_path, path);
    }

    #[test]
    #[serial]
    fn load_with_missing_explicit_path_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("missing.toml");
        reset_vars();

        let err = AppConfig::load_with_path(Some(&path)).expect_err("load should fail");
        assert!(err.to_string().contains("file does not exist"));
    }

    #[test]
    #[serial]
    fn load_appends_normalizer_rules_after_physics_table() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
[normalizer]
enabled = false

[[normalizer.rules]]
pattern = '\hbar'
replacement = "ħ"
"#,
        );

        let cfg = load_from_xdg(tmp.path()).expect("load config");
        assert!(!cfg.normalizer.enabled);
        assert_eq!(
            cfg.normalizer.table.len(),
            ReplacementTable::physics().len() + 1
        );
        let last = cfg.normalizer.table.rules().last().expect("last rule");
        assert_eq!(last.pattern(), r"\hbar");
        assert_eq!(cfg.text_normalizer().normalize(r"E = \hbar\omega"), "E = ħω");
    }

    #[test]
    #[serial]
    fn load_fails_on_empty_rule_pattern() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
[[normalizer.rules]]
pattern = '\hbar'
replacement = "ħ"

[[normalizer.rules]]
pattern = ""
replacement = "x"
"#,
        );

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");
        assert!(
            err.to_string()
                .contains("normalizer.rules[1]: pattern must not be empty")
        );
    }

    #[test]
    #[serial]
    fn load_fails_on_shadowed_rule_pattern() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
[[normalizer.rules]]
pattern = '\pi_2'
replacement = "π₂"
"#,
        );

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");
        let message = err.to_string();
        assert!(message.contains("normalizer.rules[0]"), "{message}");
        assert!(message.contains("would be pre-empted"), "{message}");
    }

    #[test]
    #[serial]
    fn load_fails_on_unknown_rule_key() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_default_config(
            tmp.path(),
            r#"
[[normalizer.rules]]
pattern = "a"
replacement = "b"
regex = true
"#,
        );

        let err = load_from_xdg(tmp.path()).expect_err("load should fail");
        assert!(err.to_string().contains("unknown field"));
    }
}
