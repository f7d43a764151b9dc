use crate::infra::metrics::{MetricsServerConfig, TlsConfig};
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const CONFIG_DIR_ENV: &str = "APP_CONFIG_DIR";
const CONFIG_PROFILE_ENV: &str = "APP_CONFIG_PROFILE";
const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_PROFILE: &str = "default";

const CLOUD_SUFFIXES: &[&str] = &[".atlassian.net", ".jira.com", ".jira-dev.com"];

/// `true/1/yes/y/on`, case-insensitive.
pub fn is_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "y" | "on"
    )
}

/// SSL verification stays on unless explicitly disabled.
fn ssl_verify_from(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, api_token: String },
    Bearer(String),
}

/// Resolved connection settings for one product area.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub url: Url,
    pub auth: Auth,
    pub ssl_verify: bool,
    pub is_cloud: bool,
    pub filter: Option<String>,
}

pub fn is_cloud_url(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    if host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1" {
        return false;
    }
    host == "api.atlassian.com" || CLOUD_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub read_only_mode: Option<bool>,
    pub jira_url: Option<String>,
    pub jira_username: Option<String>,
    pub jira_api_token: Option<String>,
    pub jira_personal_token: Option<String>,
    pub jira_ssl_verify: Option<bool>,
    pub jira_projects_filter: Option<String>,
    pub confluence_url: Option<String>,
    pub confluence_username: Option<String>,
    pub confluence_api_token: Option<String>,
    pub confluence_personal_token: Option<String>,
    pub confluence_ssl_verify: Option<bool>,
    pub confluence_spaces_filter: Option<String>,
    pub metrics_addr: Option<String>,
    pub allow_insecure_metrics_dev: Option<bool>,
    pub metrics_auth_token: Option<String>,
    pub metrics_tls_cert_path: Option<String>,
    pub metrics_tls_key_path: Option<String>,
}

struct ServiceKeys<'a> {
    label: &'static str,
    prefix: &'static str,
    url: &'a Option<String>,
    username: &'a Option<String>,
    api_token: &'a Option<String>,
    personal_token: &'a Option<String>,
    ssl_verify: Option<bool>,
    filter: &'a Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let base_dir = env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR));
        Self::load_from_dir(&base_dir)
    }

    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut config = AppConfig::default();
        let mut overlays = Vec::new();

        if dir.exists() {
            let mut profiles = vec![DEFAULT_PROFILE.to_string()];
            if let Ok(active_profile) = env::var(CONFIG_PROFILE_ENV) {
                if !active_profile.trim().is_empty() && active_profile != DEFAULT_PROFILE {
                    profiles.push(active_profile);
                }
            }
            profiles.push("local".to_string());

            for profile in profiles {
                let candidate = dir.join(format!("{profile}.toml"));
                if let Some(overlay) = ConfigOverlay::from_file(&candidate)? {
                    overlays.push(overlay);
                }
            }
        }

        overlays.push(ConfigOverlay::from_env());

        for overlay in overlays {
            config.apply_overlay(overlay);
        }

        Ok(config)
    }

    pub fn read_only(&self) -> bool {
        self.read_only_mode.unwrap_or(false)
    }

    pub fn jira_settings(&self) -> Option<ServiceSettings> {
        resolve_service(ServiceKeys {
            label: "Jira",
            prefix: "JIRA",
            url: &self.jira_url,
            username: &self.jira_username,
            api_token: &self.jira_api_token,
            personal_token: &self.jira_personal_token,
            ssl_verify: self.jira_ssl_verify,
            filter: &self.jira_projects_filter,
        })
    }

    pub fn confluence_settings(&self) -> Option<ServiceSettings> {
        resolve_service(ServiceKeys {
            label: "Confluence",
            prefix: "CONFLUENCE",
            url: &self.confluence_url,
            username: &self.confluence_username,
            api_token: &self.confluence_api_token,
            personal_token: &self.confluence_personal_token,
            ssl_verify: self.confluence_ssl_verify,
            filter: &self.confluence_spaces_filter,
        })
    }

    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        macro_rules! merge {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = overlay.$field {
                    self.$field = Some(value);
                })+
            };
        }
        merge!(
            read_only_mode,
            jira_url,
            jira_username,
            jira_api_token,
            jira_personal_token,
            jira_ssl_verify,
            jira_projects_filter,
            confluence_url,
            confluence_username,
            confluence_api_token,
            confluence_personal_token,
            confluence_ssl_verify,
            confluence_spaces_filter,
            metrics_addr,
            allow_insecure_metrics_dev,
            metrics_auth_token,
            metrics_tls_cert_path,
            metrics_tls_key_path,
        );
    }

    pub fn metrics_server_config(&self) -> Result<Option<MetricsServerConfig>> {
        let addr = match self.metrics_addr.as_ref() {
            Some(addr) => addr
                .parse::<SocketAddr>()
                .with_context(|| format!("parse METRICS_ADDR '{}'", addr))?,
            None => return Ok(None),
        };

        let tls = match (
            self.metrics_tls_cert_path.as_ref(),
            self.metrics_tls_key_path.as_ref(),
        ) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "metrics TLS requires both METRICS_TLS_CERT_PATH and METRICS_TLS_KEY_PATH"
                ));
            }
        };

        Ok(Some(MetricsServerConfig {
            addr,
            auth_token: self.metrics_auth_token.clone(),
            allow_insecure: self.allow_insecure_metrics_dev.unwrap_or(false),
            tls,
        }))
    }
}

/// `None` (with a warning) when the area has a URL but unusable credentials.
fn resolve_service(keys: ServiceKeys<'_>) -> Option<ServiceSettings> {
    let raw_url = present(keys.url)?;
    let url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(area = keys.label, url = %raw_url, %err, "invalid service URL; area disabled");
            return None;
        }
    };
    let is_cloud = is_cloud_url(&url);
    let username = present(keys.username);
    let api_token = present(keys.api_token);
    let personal_token = present(keys.personal_token);

    let auth = match (username, api_token, personal_token) {
        (Some(username), Some(api_token), _) => Auth::Basic {
            username,
            api_token,
        },
        (_, _, Some(token)) if !is_cloud => Auth::Bearer(token),
        _ => {
            let prefix = keys.prefix;
            let missing = if is_cloud {
                format!("{prefix}_USERNAME and {prefix}_API_TOKEN")
            } else {
                format!("{prefix}_PERSONAL_TOKEN or {prefix}_USERNAME and {prefix}_API_TOKEN")
            };
            tracing::warn!(area = keys.label, cloud = is_cloud, %missing, "credentials incomplete; area disabled");
            return None;
        }
    };

    Some(ServiceSettings {
        url,
        auth,
        ssl_verify: keys.ssl_verify.unwrap_or(true),
        is_cloud,
        filter: present(keys.filter),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    read_only_mode: Option<bool>,
    jira_url: Option<String>,
    jira_username: Option<String>,
    jira_api_token: Option<String>,
    jira_personal_token: Option<String>,
    jira_ssl_verify: Option<bool>,
    jira_projects_filter: Option<String>,
    confluence_url: Option<String>,
    confluence_username: Option<String>,
    confluence_api_token: Option<String>,
    confluence_personal_token: Option<String>,
    confluence_ssl_verify: Option<bool>,
    confluence_spaces_filter: Option<String>,
    metrics_addr: Option<String>,
    allow_insecure_metrics_dev: Option<bool>,
    metrics_auth_token: Option<String>,
    metrics_tls_cert_path: Option<String>,
    metrics_tls_key_path: Option<String>,
}

impl ConfigOverlay {
    fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let overlay: Self = toml::from_str(&contents)
            .with_context(|| format!("parse config file {}", path.display()))?;
        Ok(Some(overlay))
    }

    fn from_env() -> Self {
        let text = |key: &str| env::var(key).ok();
        Self {
            read_only_mode: text("READ_ONLY_MODE").map(|v| is_enabled(&v)),
            jira_url: text("JIRA_URL"),
            jira_username: text("JIRA_USERNAME"),
            jira_api_token: text("JIRA_API_TOKEN"),
            jira_personal_token: text("JIRA_PERSONAL_TOKEN"),
            jira_ssl_verify: text("JIRA_SSL_VERIFY").map(|v| ssl_verify_from(&v)),
            jira_projects_filter: text("JIRA_PROJECTS_FILTER"),
            confluence_url: text("CONFLUENCE_URL"),
            confluence_username: text("CONFLUENCE_USERNAME"),
            confluence_api_token: text("CONFLUENCE_API_TOKEN"),
            confluence_personal_token: text("CONFLUENCE_PERSONAL_TOKEN"),
            confluence_ssl_verify: text("CONFLUENCE_SSL_VERIFY").map(|v| ssl_verify_from(&v)),
            confluence_spaces_filter: text("CONFLUENCE_SPACES_FILTER"),
            metrics_addr: text("METRICS_ADDR"),
            allow_insecure_metrics_dev: text("ALLOW_INSECURE_METRICS_DEV").map(|v| is_enabled(&v)),
            metrics_auth_token: text("METRICS_AUTH_TOKEN"),
            metrics_tls_cert_path: text("METRICS_TLS_CERT_PATH"),
            metrics_tls_key_path: text("METRICS_TLS_KEY_PATH"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const SERVICE_VARS: &[&str] = &[
        "READ_ONLY_MODE",
        "JIRA_URL",
        "JIRA_USERNAME",
        "JIRA_API_TOKEN",
        "JIRA_PERSONAL_TOKEN",
        "JIRA_SSL_VERIFY",
        "JIRA_PROJECTS_FILTER",
        "CONFLUENCE_URL",
        "CONFLUENCE_USERNAME",
        "CONFLUENCE_API_TOKEN",
        "CONFLUENCE_PERSONAL_TOKEN",
        "CONFLUENCE_SSL_VERIFY",
        "CONFLUENCE_SPACES_FILTER",
        "METRICS_ADDR",
        "ALLOW_INSECURE_METRICS_DEV",
        "METRICS_AUTH_TOKEN",
        "METRICS_TLS_CERT_PATH",
        "METRICS_TLS_KEY_PATH",
        CONFIG_PROFILE_ENV,
    ];

    /// Clears every recognized variable, applies `vars`, runs `f`, restores.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let snapshot: Vec<(&str, Option<String>)> = SERVICE_VARS
            .iter()
            .map(|k| (*k, env::var(k).ok()))
            .collect();
        for key in SERVICE_VARS {
            // SAFETY: guarded by ENV_MUTEX and restored below.
            unsafe { env::remove_var(key) };
        }
        for (key, value) in vars {
            unsafe { env::set_var(key, value) };
        }
        f();
        for (key, value) in snapshot {
            match value {
                Some(val) => unsafe { env::set_var(key, val) },
                None => unsafe { env::remove_var(key) },
            }
        }
    }

    #[test]
    fn load_from_dir_without_files_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        with_env(&[], || {
            let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
            assert!(!cfg.read_only());
            assert!(cfg.jira_settings().is_none());
            assert!(cfg.confluence_settings().is_none());
            assert!(cfg.metrics_server_config().expect("metrics").is_none());
        });
        Ok(())
    }

    #[test]
    fn load_merges_profile_local_and_env() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("default.toml"),
            "jira_url = \"https://jira.example.com\"\nread_only_mode = false\n",
        )?;
        fs::write(
            dir.path().join("staging.toml"),
            "jira_personal_token = \"pat-from-profile\"\njira_projects_filter = \"OPS\"\n",
        )?;
        fs::write(dir.path().join("local.toml"), "jira_ssl_verify = false\n")?;

        with_env(
            &[(CONFIG_PROFILE_ENV, "staging"), ("READ_ONLY_MODE", "YES")],
            || {
                let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
                assert!(cfg.read_only());
                let jira = cfg.jira_settings().expect("jira configured");
                assert_eq!(jira.auth, Auth::Bearer("pat-from-profile".into()));
                assert!(!jira.ssl_verify);
                assert!(!jira.is_cloud);
                assert_eq!(jira.filter.as_deref(), Some("OPS"));
            },
        );
        Ok(())
    }

    #[test]
    fn cloud_requires_basic_credentials() -> Result<()> {
        let dir = tempdir()?;
        with_env(
            &[
                ("CONFLUENCE_URL", "https://acme.atlassian.net/wiki"),
                ("CONFLUENCE_PERSONAL_TOKEN", "pat"),
            ],
            || {
                let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
                assert!(cfg.confluence_settings().is_none());
            },
        );
        with_env(
            &[
                ("CONFLUENCE_URL", "https://acme.atlassian.net/wiki"),
                ("CONFLUENCE_USERNAME", "me@acme.io"),
                ("CONFLUENCE_API_TOKEN", "tok"),
                ("CONFLUENCE_SSL_VERIFY", "maybe"),
            ],
            || {
                let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
                let settings = cfg.confluence_settings().expect("confluence configured");
                assert!(settings.is_cloud);
                assert!(settings.ssl_verify);
                assert!(matches!(settings.auth, Auth::Basic { .. }));
            },
        );
        Ok(())
    }

    #[rstest]
    #[case("https://acme.atlassian.net", true)]
    #[case("https://acme.jira.com", true)]
    #[case("https://api.atlassian.com/ex/jira/123", true)]
    #[case("https://jira.internal.corp", false)]
    #[case("http://localhost:8080", false)]
    #[case("http://127.0.0.1:9", false)]
    fn cloud_detection(#[case] raw: &str, #[case] cloud: bool) {
        assert_eq!(is_cloud_url(&Url::parse(raw).unwrap()), cloud);
    }

    #[rstest]
    #[case("true", true)]
    #[case("On", true)]
    #[case("y", true)]
    #[case("1", true)]
    #[case("off", false)]
    #[case("", false)]
    fn enabled_flag_parsing(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(is_enabled(raw), expected);
    }

    #[test]
    fn metrics_server_config_requires_tls_pair() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("default.toml"),
            "metrics_addr = \"0.0.0.0:9100\"\nmetrics_tls_cert_path = \"cert.pem\"\n",
        )?;
        with_env(&[], || {
            let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
            assert!(cfg.metrics_server_config().is_err());
        });
        with_env(&[("METRICS_TLS_KEY_PATH", "key.pem")], || {
            let cfg = AppConfig::load_from_dir(dir.path()).expect("config load");
            let server_cfg = cfg
                .metrics_server_config()
                .expect("metrics cfg")
                .expect("metrics enabled");
            assert_eq!(server_cfg.addr, "0.0.0.0:9100".parse().unwrap());
            assert!(server_cfg.tls.is_some());
        });
        Ok(())
    }
}
