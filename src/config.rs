//! Filesystem locations and environment overrides.

use std::path::PathBuf;

/// Env var naming the profile/job database file.
pub const DB_ENV: &str = "COLMAP_DB";

/// Env var naming a dictionary JSON file.
pub const DICTIONARY_ENV: &str = "COLMAP_DICTIONARY";

/// Env var holding the log filter directive for the CLI.
pub const LOG_ENV: &str = "COLMAP_LOG";

const DB_FILE: &str = "colmap.db";

/// `$XDG_DATA_HOME/colmap`, falling back to `~/.local/share/colmap`.
pub fn data_dir() -> Option<PathBuf> {
    let data_home = std::env::var("XDG_DATA_HOME")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local/share"))
        })?;
    Some(data_home.join("colmap"))
}

/// Resolve the database path: explicit flag, then `$COLMAP_DB`, then the
/// data directory. Falls back to a file in the working directory when no
/// home directory is known.
pub fn database_path(flag: Option<&str>) -> PathBuf {
    if let Some(path) = flag {
        return PathBuf::from(path);
    }
    if let Ok(path) = std::env::var(DB_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    data_dir()
        .map(|d| d.join(DB_FILE))
        .unwrap_or_else(|| PathBuf::from(DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(database_path(Some("/tmp/x.db")), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn default_path_ends_with_db_file() {
        let p = database_path(None);
        assert!(p.to_string_lossy().ends_with(".db"));
    }
}
