use std::fs;
use std::path::{Path, PathBuf};

use derive_setters::Setters;
use serde::Deserialize;
use tracing::debug;

use crate::domain::AdminError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Local {
        data_dir: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default = "default_per_page")]
        per_page: usize,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

fn default_per_page() -> usize {
    50
}

fn default_timeout() -> u64 {
    10
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.local/share/ministry-admin")
}

/// Backend picked on the command line.
#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum BackendKind {
    Memory,
    Local,
    Http,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Setters)]
#[serde(default)]
pub struct AdminConfig {
    /// Milliseconds to wait for a terminal event before redrawing.
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Terminals narrower than this get the card layout.
    pub card_breakpoint: usize,
    pub toast_seconds: u64,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
    pub start_resource: String,
    pub backend: BackendConfig,
}

impl Default for AdminConfig {
    fn default() -> Self {
        AdminConfig {
            event_poll_time: 100,
            max_column_width: 30,
            card_breakpoint: 80,
            toast_seconds: 4,
            export_dir: PathBuf::from("~/ministry-exports"),
            log_file: std::env::temp_dir().join("ministry-admin.log"),
            start_resource: "articles".to_string(),
            backend: BackendConfig::default(),
        }
    }
}

impl AdminConfig {
    pub fn load(path: &Path) -> Result<Self, AdminError> {
        let content = fs::read_to_string(expand_path(path)?)?;
        let config: AdminConfig = toml::from_str(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        config.resolved()
    }

    /// Expand `~` and environment variables in every configured path.
    pub fn resolved(mut self) -> Result<Self, AdminError> {
        self.export_dir = expand_path(&self.export_dir)?;
        self.log_file = expand_path(&self.log_file)?;
        if let BackendConfig::Local { data_dir } = &mut self.backend {
            *data_dir = expand_path(data_dir)?;
        }
        if self.card_breakpoint == 0 {
            return Err(AdminError::Config("card_breakpoint must be positive".into()));
        }
        Ok(self)
    }
}

impl BackendConfig {
    /// Apply command line choices on top of the configured backend.
    ///
    /// A data directory alone selects the local store and an API url alone
    /// selects HTTP.
    pub fn overridden(
        self,
        kind: Option<BackendKind>,
        data_dir: Option<PathBuf>,
        api_url: Option<String>,
    ) -> Result<Self, AdminError> {
        let kind = kind.or(match (&data_dir, &api_url) {
            (Some(_), _) => Some(BackendKind::Local),
            (None, Some(_)) => Some(BackendKind::Http),
            (None, None) => None,
        });
        let backend = match (kind, self) {
            (None, current) => current,
            (Some(BackendKind::Memory), _) => BackendConfig::Memory,
            (Some(BackendKind::Local), current) => {
                let data_dir = match (data_dir, current) {
                    (Some(dir), _) => dir,
                    (None, BackendConfig::Local { data_dir }) => data_dir,
                    (None, _) => default_data_dir(),
                };
                BackendConfig::Local {
                    data_dir: expand_path(&data_dir)?,
                }
            }
            (Some(BackendKind::Http), current) => match (api_url, current) {
                (Some(base_url), BackendConfig::Http { per_page, timeout_secs, .. }) => {
                    BackendConfig::Http {
                        base_url,
                        per_page,
                        timeout_secs,
                    }
                }
                (Some(base_url), _) => BackendConfig::Http {
                    base_url,
                    per_page: default_per_page(),
                    timeout_secs: default_timeout(),
                },
                (None, current @ BackendConfig::Http { .. }) => current,
                (None, _) => {
                    return Err(AdminError::Config("the http backend needs --api-url".into()));
                }
            },
        };
        Ok(backend)
    }
}

pub fn expand_path(path: &Path) -> Result<PathBuf, AdminError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map_err(|e| AdminError::Config(format!("cannot expand {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: AdminConfig = toml::from_str("").unwrap();
        assert_eq!(config, AdminConfig::default());
    }

    #[test]
    fn reads_http_backend() {
        let config: AdminConfig = toml::from_str(
            r#"
            card_breakpoint = 100
            [backend]
            kind = "http"
            base_url = "https://admin.example.org"
            "#,
        )
        .unwrap();
        assert_eq!(config.card_breakpoint, 100);
        assert_eq!(
            config.backend,
            BackendConfig::Http {
                base_url: "https://admin.example.org".into(),
                per_page: 50,
                timeout_secs: 10,
            }
        );
    }

    #[test]
    fn expands_home_in_paths() {
        let home = PathBuf::from(std::env::var("HOME").unwrap());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.toml");
        fs::write(
            &path,
            "export_dir = \"$HOME/ministry/out\"\nlog_file = \"~/ministry.log\"\n[backend]\nkind = \"memory\"\n",
        )
        .unwrap();
        let config = AdminConfig::load(&path).unwrap();
        assert_eq!(config.export_dir, home.join("ministry/out"));
        assert_eq!(config.log_file, home.join("ministry.log"));
        assert_eq!(config.backend, BackendConfig::Memory);
    }

    #[test]
    fn setters_override_values() {
        let config = AdminConfig::default()
            .card_breakpoint(60usize)
            .backend(BackendConfig::Memory);
        assert_eq!(config.card_breakpoint, 60);
        assert_eq!(config.backend, BackendConfig::Memory);
    }

    #[test]
    fn command_line_overrides_backend() {
        let local = BackendConfig::default()
            .overridden(None, Some(PathBuf::from("/srv/ministry")), None)
            .unwrap();
        assert_eq!(
            local,
            BackendConfig::Local {
                data_dir: PathBuf::from("/srv/ministry")
            }
        );

        let http = BackendConfig::Memory
            .overridden(None, None, Some("http://localhost:3000".into()))
            .unwrap();
        assert!(matches!(http, BackendConfig::Http { per_page: 50, .. }));

        let memory = http.overridden(Some(BackendKind::Memory), None, None).unwrap();
        assert_eq!(memory, BackendConfig::Memory);

        assert!(
            BackendConfig::Memory
                .overridden(Some(BackendKind::Http), None, None)
                .is_err()
        );
    }

    #[test]
    fn zero_breakpoint_is_rejected() {
        assert!(AdminConfig::default().card_breakpoint(0usize).resolved().is_err());
    }
}
