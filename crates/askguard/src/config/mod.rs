use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_CACHE_CAPACITY, InvalidationMode};
use crate::models::Role;

pub const DEFAULT_ROW_LIMIT: u64 = 200;
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(3);
pub const DATABASE_FILE_NAME: &str = "data.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub db_path: PathBuf,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    db_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let db_path = match db_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => home_dir.join(".askguard").join(DATABASE_FILE_NAME),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        db_path: normalize_lexical(&db_path),
    })
}

pub fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
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
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
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

/// Per-role table substitutions, e.g. `viewer: customers -> viewer_customers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMappings(BTreeMap<Role, BTreeMap<String, String>>);

impl Default for RoleMappings {
    fn default() -> Self {
        let mut viewer = BTreeMap::new();
        viewer.insert("customers".to_string(), "viewer_customers".to_string());

        let mut mappings = BTreeMap::new();
        mappings.insert(Role::Viewer, viewer);
        Self(mappings)
    }
}

impl RoleMappings {
    #[must_use]
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with_mapping(
        mut self,
        role: Role,
        table: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.0
            .entry(role)
            .or_default()
            .insert(table.into(), replacement.into());
        self
    }

    /// Substitutions for `role`; roles without an entry see every table as-is.
    #[must_use]
    pub fn for_role(&self, role: Role) -> BTreeMap<String, String> {
        self.0.get(&role).cloned().unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let mappings: Self =
            serde_json::from_str(raw).context("role mappings must be a JSON object keyed by role")?;
        for (role, tables) in &mappings.0 {
            for (table, replacement) in tables {
                if table.trim().is_empty() || replacement.trim().is_empty() {
                    bail!("role `{role}` has an empty table mapping entry");
                }
            }
        }
        Ok(mappings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read role mappings: {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("failed to parse role mappings: {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub default_limit: u64,
    pub execution_timeout: Duration,
    pub cache_capacity: usize,
    pub invalidation: InvalidationMode,
    pub role_mappings: RoleMappings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_ROW_LIMIT,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            invalidation: InvalidationMode::All,
            role_mappings: RoleMappings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            bail!("default_limit must be greater than zero");
        }
        if self.execution_timeout.is_zero() {
            bail!("execution_timeout must be greater than zero");
        }
        if self.cache_capacity == 0 {
            bail!("cache_capacity must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{PipelineConfig, RoleMappings, resolve_runtime_paths};
    use crate::models::Role;
    use std::path::Path;

    #[test]
    fn defaults_database_under_askguard_home() {
        let paths = resolve_runtime_paths(Path::new("/home/tester"), Path::new("/work/repo"), None)
            .expect("paths should resolve");

        assert_eq!(paths.home_dir, Path::new("/home/tester"));
        assert_eq!(paths.cwd, Path::new("/work/repo"));
        assert_eq!(paths.db_path, Path::new("/home/tester/.askguard/data.db"));
    }

    #[test]
    fn expands_tilde_override_against_home_dir() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("~/bank/data.db")),
        )
        .expect("tilde override should resolve");

        assert_eq!(paths.db_path, Path::new("/home/tester/bank/data.db"));
    }

    #[test]
    fn resolves_relative_override_against_cwd() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("./app/../app/data.db")),
        )
        .expect("relative override should resolve");

        assert_eq!(paths.db_path, Path::new("/work/repo/app/data.db"));
    }

    #[test]
    fn rejects_non_absolute_home_dir() {
        let err = resolve_runtime_paths(Path::new("home/tester"), Path::new("/work/repo"), None)
            .expect_err("relative home dir must fail");

        assert!(
            err.to_string().contains("home_dir must be absolute"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn default_role_mappings_mask_customers_for_viewers() {
        let mappings = RoleMappings::default();
        assert_eq!(
            mappings.for_role(Role::Viewer).get("customers").map(String::as_str),
            Some("viewer_customers")
        );
        assert!(mappings.for_role(Role::Analyst).is_empty());
    }

    #[test]
    fn role_mappings_parse_from_json() {
        let mappings = RoleMappings::from_json(
            r#"{"viewer":{"customers":"viewer_customers"},"admin":{}}"#,
        )
        .expect("mappings should parse");
        assert_eq!(mappings.for_role(Role::Viewer).len(), 1);
        assert!(mappings.for_role(Role::Admin).is_empty());

        let err = RoleMappings::from_json(r#"{"guest":{}}"#).expect_err("unknown role must fail");
        assert!(err.to_string().contains("role mappings"));
    }

    #[test]
    fn config_rejects_zero_limit() {
        let config = PipelineConfig {
            default_limit: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(PipelineConfig::default().validate().is_ok());
    }
}
