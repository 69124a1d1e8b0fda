//! Configuration handling for the autoloader: TOML loading, defaults and
//! base path normalization.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ConfigError;
use crate::fingerprint::{Fingerprint, FingerprintFlags};
use crate::identifier::DEFAULT_SEPARATOR;
use crate::pseudo::PseudoPrefixPolicy;
use crate::store::{DisabledStore, FileBindingStore, PersistentBindingStore};

/// Environment variable harvested when `include_env_paths` is set.
pub const DEFAULT_ENV_VAR: &str = "SOLVRA_AUTOLOAD_PATH";
const DEFAULT_EXTENSION: &str = "php";

/// Autoloader configuration, read once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoloadConfig {
    /// Ordered search roots; the first root containing a file wins.
    pub base_paths: Vec<PathBuf>,
    /// Append the entries of `env_var` after `base_paths`.
    pub include_env_paths: bool,
    pub env_var: String,
    /// File extension appended to the identifier path, without the dot.
    pub extension: String,
    /// Hierarchical separator inside identifiers.
    pub separator: char,
    /// Identity key namespacing the persisted cache.
    pub cache_key: Option<String>,
    /// How many parent directories of `anchor` a relative base path may be
    /// resolved against.
    pub ancestor_depth: usize,
    /// Directory relative base paths are resolved from (default: cwd).
    pub anchor: Option<PathBuf>,
    /// Load and save learned bindings across runs.
    pub persist: bool,
    /// Snapshot directory (default: the user cache directory).
    pub cache_dir: Option<PathBuf>,
    pub pseudo_prefix: PseudoPrefixPolicy,
}

impl Default for AutoloadConfig {
    fn default() -> Self {
        Self {
            base_paths: Vec::new(),
            include_env_paths: false,
            env_var: DEFAULT_ENV_VAR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            separator: DEFAULT_SEPARATOR,
            cache_key: None,
            ancestor_depth: 0,
            anchor: None,
            persist: true,
            cache_dir: None,
            pseudo_prefix: PseudoPrefixPolicy::default(),
        }
    }
}

/// Outcome of base path normalization.
#[derive(Debug, Default)]
pub struct BasePaths {
    pub paths: Vec<PathBuf>,
    pub skipped: Vec<ConfigError>,
}

impl AutoloadConfig {
    pub fn with_base_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            base_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading autoload configuration from {}", path.display()))?;
        let mut cfg: Self = toml::from_str(&data)
            .with_context(|| format!("parsing autoload configuration {}", path.display()))?;
        cfg.validate()?;
        // relative roots in a config file are relative to that file
        let dir = absolutize(path.parent().unwrap_or(Path::new("")))
            .with_context(|| format!("resolving directory of {}", path.display()))?;
        cfg.anchor = Some(match cfg.anchor.take() {
            Some(anchor) if anchor.is_absolute() => anchor,
            Some(anchor) => dir.join(anchor),
            None => dir,
        });
        Ok(cfg)
    }

    /// Persist the configuration back to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("writing autoload configuration to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let sep = self.separator;
        if sep == '/' || sep == '\0' || sep.is_alphanumeric() || sep.is_whitespace() {
            return Err(ConfigError::InvalidSeparator(sep.to_string()));
        }
        let extension = self.extension.trim_start_matches('.');
        if extension.contains(['/', '\\']) {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }
        self.extension = extension.to_string();
        Ok(())
    }

    pub fn fingerprint_flags(&self) -> FingerprintFlags {
        FingerprintFlags {
            include_env_paths: self.include_env_paths,
            extension: self.extension.clone(),
            separator: self.separator,
            pseudo_prefix: self.pseudo_prefix,
        }
    }

    /// Key under which snapshots are stored.
    pub fn store_key(&self, fingerprint: Fingerprint) -> String {
        self.cache_key
            .clone()
            .unwrap_or_else(|| fingerprint.to_string())
    }

    /// Persistent store selected by this configuration.
    pub fn open_store(&self) -> Box<dyn PersistentBindingStore> {
        if !self.persist {
            return Box::new(DisabledStore);
        }
        if let Some(dir) = &self.cache_dir {
            return Box::new(FileBindingStore::new(dir.clone()));
        }
        match FileBindingStore::in_user_cache() {
            Ok(store) => Box::new(store),
            Err(err) => {
                warn!(error = %err, "binding persistence disabled");
                Box::new(DisabledStore)
            }
        }
    }

    /// Every configured root in order, followed by harvested env entries.
    pub fn candidate_base_paths(&self) -> Vec<PathBuf> {
        let mut candidates = self.base_paths.clone();
        if self.include_env_paths {
            if let Some(value) = env::var_os(&self.env_var) {
                candidates.extend(harvest_env_paths(&value));
            }
        }
        candidates
    }

    /// Resolve candidates to absolute canonical directories.
    ///
    /// Missing entries are skipped and returned in `skipped`; later
    /// duplicates of an earlier root are dropped.
    pub fn resolve_base_paths(&self) -> BasePaths {
        let anchor = absolutize(self.anchor.as_deref().unwrap_or(Path::new("")))
            .unwrap_or_else(|_| PathBuf::from("."));
        let mut out = BasePaths::default();
        let mut seen = HashSet::new();
        for candidate in self.candidate_base_paths() {
            match resolve_one(&candidate, &anchor, self.ancestor_depth) {
                Ok(path) => {
                    if seen.insert(path.clone()) {
                        out.paths.push(path);
                    }
                }
                Err(err) => out.skipped.push(err),
            }
        }
        out
    }
}

/// Split a search-path variable, dropping empty and `.` entries.
pub fn harvest_env_paths(value: &OsStr) -> Vec<PathBuf> {
    env::split_paths(value)
        .filter(|path| !path.as_os_str().is_empty() && path.as_os_str() != ".")
        .collect()
}

/// Join a relative path (including the empty path of a bare file name's
/// parent) onto the working directory so its ancestors can be walked.
fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()?;
    if path.as_os_str().is_empty() || path == Path::new(".") {
        Ok(cwd)
    } else {
        Ok(cwd.join(path))
    }
}

fn resolve_one(candidate: &Path, anchor: &Path, depth: usize) -> Result<PathBuf, ConfigError> {
    if candidate.is_absolute() {
        return canonical_dir(candidate);
    }
    // farthest ancestor first, the anchor itself last
    let ancestors: Vec<&Path> = anchor.ancestors().take(depth + 1).collect();
    for base in ancestors.iter().rev() {
        let joined = base.join(candidate);
        if joined.is_dir() {
            return canonical_dir(&joined);
        }
    }
    canonical_dir(&anchor.join(candidate))
}

fn canonical_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let canonical = path.canonicalize().map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingBasePath(path.to_path_buf())
        } else {
            ConfigError::Unresolvable {
                path: path.to_path_buf(),
                error,
            }
        }
    })?;
    if !canonical.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    Ok(canonical)
}

/// Render a base path with its trailing separator.
pub fn display_base(path: &Path) -> String {
    let mut rendered = path.display().to_string();
    if !rendered.ends_with(std::path::MAIN_SEPARATOR) {
        rendered.push(std::path::MAIN_SEPARATOR);
    }
    rendered
}
