use camino::Utf8PathBuf;
use std::cell::RefCell;

use crate::error::PersistenceError;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Maximum length of a project id, in bytes.
pub const MAX_PROJECT_ID_LEN: usize = 64;

/// Returns the stagehand home directory.
///
/// Resolution order:
/// 1) thread-local override (tests only)
/// 2) env `STAGEHAND_HOME`
/// 3) default ".stagehand"
#[must_use]
pub fn stagehand_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("STAGEHAND_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".stagehand")
}

/// Returns `<STAGEHAND_HOME>/projects/<project_id>`
#[must_use]
pub fn project_root(project_id: &str) -> Utf8PathBuf {
    stagehand_home().join("projects").join(project_id)
}

/// Returns `<STAGEHAND_HOME>/projects/<project_id>/state.json`
#[must_use]
pub fn state_path(project_id: &str) -> Utf8PathBuf {
    project_root(project_id).join("state.json")
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Validate a project id before it is used as a directory name.
///
/// Ids are 1-64 ASCII characters from `[A-Za-z0-9._-]`, may not start with
/// a dot and may not be `.` or `..`.
pub fn validate_project_id(project_id: &str) -> Result<(), PersistenceError> {
    let invalid = |reason: &str| PersistenceError::InvalidProjectId {
        project: project_id.to_string(),
        reason: reason.to_string(),
    };

    if project_id.is_empty() {
        return Err(invalid("id is empty"));
    }
    if project_id.len() > MAX_PROJECT_ID_LEN {
        return Err(invalid("id is longer than 64 characters"));
    }
    if project_id.starts_with('.') {
        return Err(invalid("id may not start with '.'"));
    }
    if let Some(bad) = project_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("character '{bad}' is not allowed")));
    }
    Ok(())
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: give this thread a unique home under the system temp dir.
///
/// Hold the `HomeGuard` for the test's duration so the directory stays alive.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp dir");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_home_overrides_env() {
        let guard = with_isolated_home();
        let home = stagehand_home();
        assert_eq!(home.as_std_path(), guard.path());
        assert_eq!(
            state_path("acme"),
            home.join("projects").join("acme").join("state.json")
        );
    }

    #[test]
    fn test_home_resets_after_guard_drop() {
        {
            let _guard = with_isolated_home();
        }
        THREAD_HOME.with(|tl| assert!(tl.borrow().is_none()));
    }

    #[test]
    fn test_project_id_validation() {
        assert!(validate_project_id("acme-dw_2026.q3").is_ok());

        for bad in ["", ".hidden", "..", "a/b", "a b", "naïve"] {
            assert!(validate_project_id(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(validate_project_id(&"x".repeat(65)).is_err());
        assert!(validate_project_id(&"x".repeat(64)).is_ok());
    }
}
