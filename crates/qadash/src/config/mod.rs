use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};

use crate::cache::RefreshPolicy;

pub const DEFAULT_DATA_DIR: &str = "public/data";
pub const JSON_SNAPSHOT_FILE: &str = "qa-data.json";
pub const SQLITE_DATABASE_FILE: &str = "qa-dashboard.db";
pub const DATA_SOURCE_DISABLED: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub cwd: PathBuf,
    pub data_dir: PathBuf,
    pub json_snapshot: PathBuf,
    /// `None` when the SQLite store is switched off.
    pub sqlite_path: Option<PathBuf>,
}

/// Resolves where snapshots live.
///
/// `data_source` follows the `DATA_SOURCE` convention: unset uses the default
/// database, `none` disables SQLite, a `.json` path replaces the JSON snapshot
/// and anything else names the SQLite file.
pub fn resolve_runtime_paths(
    home_dir: Option<&Path>,
    cwd: &Path,
    data_dir_override: Option<&Path>,
    data_source: Option<&str>,
) -> Result<RuntimePaths> {
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }
    if let Some(home_dir) = home_dir.filter(|home_dir| !home_dir.is_absolute()) {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }

    let cwd = normalize_lexical(cwd);
    let data_dir = match data_dir_override {
        Some(path) => resolve_user_path(path, home_dir, &cwd)?,
        None => normalize_lexical(&cwd.join(DEFAULT_DATA_DIR)),
    };
    let mut json_snapshot = data_dir.join(JSON_SNAPSHOT_FILE);

    let sqlite_path = match data_source.map(str::trim).filter(|value| !value.is_empty()) {
        None => Some(data_dir.join(SQLITE_DATABASE_FILE)),
        Some(value) if value.eq_ignore_ascii_case(DATA_SOURCE_DISABLED) => None,
        Some(value) => {
            let path = resolve_user_path(Path::new(value), home_dir, &cwd)?;
            if has_json_extension(&path) {
                json_snapshot = path;
                None
            } else {
                Some(path)
            }
        }
    };

    Ok(RuntimePaths {
        cwd,
        data_dir,
        json_snapshot,
        sqlite_path,
    })
}

#[must_use]
pub fn refresh_policy(max_age_secs: u64, fetch_timeout_ms: u64) -> RefreshPolicy {
    RefreshPolicy {
        max_age: Duration::from_secs(max_age_secs),
        fetch_timeout: Duration::from_millis(fetch_timeout_ms),
        ..RefreshPolicy::default()
    }
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

fn resolve_user_path(path: &Path, home_dir: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: Option<&Path>) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let Some(home_dir) = home_dir else {
                bail!("HOME is not set; cannot expand {}", path.display());
            };
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "only `~` and `~/...` are expanded: {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
