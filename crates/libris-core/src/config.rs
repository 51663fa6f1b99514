use crate::error::{LibrisError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Role store location, relative to the project root unless absolute.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATABASE)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// SetupConfig
// ---------------------------------------------------------------------------

/// Shell commands run by `libris setup`. `{requirements}` in `install` is
/// replaced with the chosen requirements file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    #[serde(default = "default_requirements")]
    pub requirements: String,
    #[serde(default = "default_fallback_requirements")]
    pub fallback_requirements: String,
    #[serde(default = "default_install")]
    pub install: String,
    #[serde(default = "default_make_migrations")]
    pub make_migrations: String,
    #[serde(default = "default_migrate")]
    pub migrate: String,
    #[serde(default = "default_create_superuser")]
    pub create_superuser: String,
    #[serde(default = "default_sample_data")]
    pub sample_data: String,
    #[serde(default = "default_run_server")]
    pub run_server: String,
    /// Per-step limit for captured steps. `0` means no limit.
    #[serde(default)]
    pub timeout_seconds: u64,
}

fn default_requirements() -> String {
    paths::REQUIREMENTS_LOCAL.to_string()
}

fn default_fallback_requirements() -> String {
    paths::REQUIREMENTS.to_string()
}

fn default_install() -> String {
    "pip install -r {requirements}".to_string()
}

fn default_make_migrations() -> String {
    "python manage.py makemigrations".to_string()
}

fn default_migrate() -> String {
    "python manage.py migrate".to_string()
}

fn default_create_superuser() -> String {
    "python manage.py createsuperuser".to_string()
}

fn default_sample_data() -> String {
    "python manage.py populatedb --users=50".to_string()
}

fn default_run_server() -> String {
    "python manage.py runserver".to_string()
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            requirements: default_requirements(),
            fallback_requirements: default_fallback_requirements(),
            install: default_install(),
            make_migrations: default_make_migrations(),
            migrate: default_migrate(),
            create_superuser: default_create_superuser(),
            sample_data: default_sample_data(),
            run_server: default_run_server(),
            timeout_seconds: 0,
        }
    }
}

impl SetupConfig {
    /// Every configured command with the key it is stored under.
    pub fn commands(&self) -> [(&'static str, &str); 6] {
        [
            ("install", self.install.as_str()),
            ("make_migrations", self.make_migrations.as_str()),
            ("migrate", self.migrate.as_str()),
            ("create_superuser", self.create_superuser.as_str()),
            ("sample_data", self.sample_data.as_str()),
            ("run_server", self.run_server.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub setup: SetupConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            database: DatabaseConfig::default(),
            setup: SetupConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(LibrisError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.database.path)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, command) in self.setup.commands() {
            let Some(program) = command.split_whitespace().next() else {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("setup.{key} is empty"),
                });
                continue;
            };
            if which::which(program).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("setup.{key}: program '{program}' not found on PATH"),
                });
            }
        }

        if !self.setup.install.contains("{requirements}") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "setup.install does not reference {requirements}; \
                          the requirements file will not be passed"
                    .to_string(),
            });
        }

        if self.setup.requirements.trim().is_empty()
            && self.setup.fallback_requirements.trim().is_empty()
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "no requirements file configured".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
