//! Continuity-token persistence.
//!
//! One logical slot per client context. The primary tier is a file in the
//! user data directory; when that is unwritable the token falls back to a
//! dot-file in the home directory. Losing the token silently would break
//! multi-turn context, so a double failure is reported to the caller as a
//! warning outcome rather than an error.

use std::{
    fs,
    path::{Path, PathBuf},
};

const TOKEN_FILE: &str = "continuity_token";
const FALLBACK_FILE: &str = ".portier_continuity";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SaveOutcome {
    Primary,
    Fallback,
    /// Neither tier accepted the write; surface a user-visible warning.
    Unavailable,
}

#[derive(Debug)]
pub struct ContinuityStore {
    primary: PathBuf,
    fallback: PathBuf,
}

impl ContinuityStore {
    /// Store rooted at the user's data directory, with the home-directory
    /// fallback tier.
    pub fn open_default() -> Self {
        let primary = directories::ProjectDirs::from("", "", "portier")
            .map(|dirs| dirs.data_dir().join(TOKEN_FILE))
            .unwrap_or_else(|| PathBuf::from(".portier").join(TOKEN_FILE));
        let fallback = directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(FALLBACK_FILE))
            .unwrap_or_else(|| std::env::temp_dir().join(FALLBACK_FILE));
        Self { primary, fallback }
    }

    pub fn with_paths(primary: PathBuf, fallback: PathBuf) -> Self {
        Self { primary, fallback }
    }

    fn write_tier(path: &Path, token: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, token)
    }

    /// Persist the token, unconditionally overwriting any prior value.
    pub fn save(&self, token: &str) -> SaveOutcome {
        match Self::write_tier(&self.primary, token) {
            Ok(()) => SaveOutcome::Primary,
            Err(primary_err) => {
                tracing::warn!(
                    path = %self.primary.display(),
                    "primary continuity tier failed: {primary_err}"
                );
                match Self::write_tier(&self.fallback, token) {
                    Ok(()) => SaveOutcome::Fallback,
                    Err(fallback_err) => {
                        tracing::warn!(
                            path = %self.fallback.display(),
                            "fallback continuity tier failed: {fallback_err}"
                        );
                        SaveOutcome::Unavailable
                    },
                }
            },
        }
    }

    /// Read the stored token, preferring the primary tier.
    pub fn load(&self) -> Option<String> {
        for path in [&self.primary, &self.fallback] {
            if let Ok(token) = fs::read_to_string(path) {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
        None
    }

    /// Drop both tiers. Used when the session is invalidated.
    pub fn clear(&self) {
        for path in [&self.primary, &self.fallback] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), "failed to clear token: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ContinuityStore {
        ContinuityStore::with_paths(
            dir.join("data").join(TOKEN_FILE),
            dir.join(FALLBACK_FILE),
        )
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load().is_none());
        assert_eq!(store.save("resp_abc"), SaveOutcome::Primary);
        assert_eq!(store.load().as_deref(), Some("resp_abc"));
    }

    #[test]
    fn save_overwrites_prior_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save("old");
        store.save("new");
        assert_eq!(store.load().as_deref(), Some("new"));
    }

    #[test]
    fn falls_back_when_primary_is_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // Primary path nested under a file, so create_dir_all fails.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let store = ContinuityStore::with_paths(
            blocker.join("nested").join(TOKEN_FILE),
            dir.path().join(FALLBACK_FILE),
        );
        assert_eq!(store.save("resp_fb"), SaveOutcome::Fallback);
        assert_eq!(store.load().as_deref(), Some("resp_fb"));
    }

    #[test]
    fn double_failure_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let store = ContinuityStore::with_paths(
            blocker.join("a").join(TOKEN_FILE),
            blocker.join("b").join(FALLBACK_FILE),
        );
        assert_eq!(store.save("resp_x"), SaveOutcome::Unavailable);
        assert!(store.load().is_none());
    }

    #[test]
    fn clear_removes_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save("resp_abc");
        store.clear();
        assert!(store.load().is_none());
        // Clearing an already-empty store is fine.
        store.clear();
    }

    #[test]
    fn empty_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::create_dir_all(store.primary.parent().unwrap()).unwrap();
        fs::write(&store.primary, "  \n").unwrap();
        assert!(store.load().is_none());
    }
}
