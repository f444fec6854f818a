//! Configuration file discovery and merging

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// File name searched for in the current directory and its ancestors.
pub const REPO_CONFIG_FILE: &str = ".mcp-probe.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading an explicitly requested file
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse config file {path}: {source}")]
    TomlParse {
        /// File that could not be parsed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// The merged table does not match the expected schema
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Merged configuration table plus the files that contributed to it.
#[derive(Debug, Clone, Default)]
pub struct LayeredTable {
    /// Merged table, later sources overriding earlier ones
    pub table: toml::Table,
    /// Files that were loaded, lowest priority first
    pub sources: Vec<PathBuf>,
}

/// Path of the global config file for the given home directory.
pub fn global_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/mcp-probe/config.toml")
}

/// Discover and merge config files.
///
/// Discovered files (global, repo-local) that fail to parse are logged and
/// skipped. An explicit path is authoritative: failure to read or parse it
/// is returned as an error.
pub fn discover(
    explicit: Option<&Path>,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<LayeredTable, ConfigError> {
    let mut layered = LayeredTable::default();

    let global = global_config_path(home_dir);
    if global.exists() {
        match load_table(&global) {
            Ok(table) => layered.push(global, table),
            Err(e) => warn!("ignoring global config: {e}"),
        }
    }

    if let Some(repo) = find_repo_local_config(current_dir) {
        match load_table(&repo) {
            Ok(table) => layered.push(repo, table),
            Err(e) => warn!("ignoring repo config: {e}"),
        }
    }

    if let Some(path) = explicit {
        let table = load_table(path)?;
        layered.push(path.to_path_buf(), table);
    }

    Ok(layered)
}

impl LayeredTable {
    fn push(&mut self, path: PathBuf, table: toml::Table) {
        debug!(path = %path.display(), "loaded config file");
        merge_tables(&mut self.table, table);
        self.sources.push(path);
    }
}

/// Find the repo-local config file.
///
/// Searches the current directory and its parents, stopping at the git root.
pub fn find_repo_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(REPO_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

/// Load a single TOML file as a table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    contents
        .parse::<toml::Table>()
        .map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn no_files_yields_empty_table() {
        let home = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        fs::create_dir(cwd.path().join(".git")).unwrap();

        let layered = discover(None, cwd.path(), home.path()).unwrap();
        assert!(layered.table.is_empty());
        assert!(layered.sources.is_empty());
    }

    #[test]
    fn repo_config_overrides_global() {
        let home = TempDir::new().unwrap();
        let global = global_config_path(home.path());
        fs::create_dir_all(global.parent().unwrap()).unwrap();
        fs::write(&global, "server_bin = \"global-bin\"\nrequest_timeout_ms = 5\n").unwrap();

        let repo = TempDir::new().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::write(repo.path().join(REPO_CONFIG_FILE), "server_bin = \"repo-bin\"\n").unwrap();

        let layered = discover(None, repo.path(), home.path()).unwrap();
        assert_eq!(layered.table["server_bin"].as_str(), Some("repo-bin"));
        assert_eq!(layered.table["request_timeout_ms"].as_integer(), Some(5));
        assert_eq!(layered.sources.len(), 2);
    }

    #[test]
    fn repo_search_walks_up_to_git_root() {
        let repo = TempDir::new().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::write(repo.path().join(REPO_CONFIG_FILE), "").unwrap();
        let nested = repo.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let found = find_repo_local_config(&nested).unwrap();
        assert_eq!(found, repo.path().join(REPO_CONFIG_FILE));
    }

    #[test]
    fn broken_discovered_file_is_skipped() {
        let home = TempDir::new().unwrap();
        let repo = TempDir::new().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::write(repo.path().join(REPO_CONFIG_FILE), "server_bin = [").unwrap();

        let layered = discover(None, repo.path(), home.path()).unwrap();
        assert!(layered.table.is_empty());
    }

    #[test]
    fn broken_explicit_file_is_an_error() {
        let home = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        fs::create_dir(cwd.path().join(".git")).unwrap();
        let explicit = cwd.path().join("probe.toml");
        fs::write(&explicit, "server_bin = [").unwrap();

        let err = discover(Some(&explicit), cwd.path(), home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let home = TempDir::new().unwrap();
        let cwd = TempDir::new().unwrap();
        fs::create_dir(cwd.path().join(".git")).unwrap();

        let err = discover(Some(&cwd.path().join("nope.toml")), cwd.path(), home.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn nested_tables_merge_per_key() {
        let mut base: toml::Table = "[steps]\necho = true\nping = true\n".parse().unwrap();
        let overlay: toml::Table = "[steps]\necho = false\n".parse().unwrap();
        merge_tables(&mut base, overlay);

        let steps = base["steps"].as_table().unwrap();
        assert_eq!(steps["echo"].as_bool(), Some(false));
        assert_eq!(steps["ping"].as_bool(), Some(true));
    }
}
