use crate::error::{LibrisError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File and directory constants
// ---------------------------------------------------------------------------

/// Marker file that identifies a project root. Also holds the configuration.
pub const CONFIG_FILE: &str = "libris.yaml";

pub const DATA_DIR: &str = ".libris";
pub const DEFAULT_DATABASE: &str = ".libris/roles.redb";

pub const REQUIREMENTS_LOCAL: &str = "requirements-local.txt";
pub const REQUIREMENTS: &str = "requirements.txt";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

/// Resolve a configured path against the project root. Absolute paths pass through.
pub fn resolve(root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        root.join(configured)
    }
}

// ---------------------------------------------------------------------------
// Role name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_role_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(LibrisError::InvalidRoleName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
