//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// How long a single request may take before it is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Prefix of every stored-object token.
pub const TOKEN_PREFIX: &str = "mctl_obj_";

/// Entries shown by `/history` when no count is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default database path: `~/.matlabctl/matlabctl.db`.
/// Single DB for history and config.
pub fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".matlabctl").join("matlabctl.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_from_cargo_toml() {
        assert!(AUTHOR.contains("Assaf Sapir"));
        assert!(HOMEPAGE.contains("sapir.io"));
        assert!(REPO.contains("matlabctl"));
    }

    #[test]
    fn token_prefix_is_an_identifier() {
        assert!(crate::value::is_identifier(TOKEN_PREFIX));
    }

    #[test]
    fn default_db_path_lives_in_dot_dir() {
        if let Some(path) = default_db_path() {
            assert!(path.ends_with(".matlabctl/matlabctl.db"));
        }
    }
}
