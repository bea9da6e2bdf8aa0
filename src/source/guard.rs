//! Confinement of user-supplied paths to the project root

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Resolves relative paths against a fixed root and refuses anything that
/// would land outside of it.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Create a guard for `root`. The root is canonicalized so that later
    /// prefix checks compare like with like.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `user_path` to an absolute path inside the root.
    ///
    /// Absolute inputs and any `..` segment are rejected before the
    /// filesystem is touched. If the target already exists it is
    /// canonicalized as well, so a symlink pointing out of the root is
    /// rejected too. Existence is otherwise left to the caller.
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf> {
        let relative = Self::normalize(user_path)?;
        let joined = self.root.join(&relative);

        match std::fs::canonicalize(&joined) {
            Ok(canonical) if canonical.starts_with(&self.root) => Ok(canonical),
            Ok(_) => Err(Error::PathTraversal {
                path: user_path.to_string(),
                reason: "resolves outside the project root".to_string(),
            }),
            Err(_) => Ok(joined),
        }
    }

    /// Lexically normalize a relative path: drop `.` segments, reject
    /// absolute roots, drive prefixes and `..`.
    fn normalize(user_path: &str) -> Result<PathBuf> {
        let reject = |reason: &str| Error::PathTraversal {
            path: user_path.to_string(),
            reason: reason.to_string(),
        };

        if user_path.trim().is_empty() {
            return Err(Error::FileNotFound {
                path: user_path.to_string(),
            });
        }

        let mut normalized = PathBuf::new();
        for component in Path::new(user_path).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(reject("parent directory segments are not allowed"))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(reject("absolute paths are not allowed"))
                }
            }
        }

        Ok(normalized)
    }

    /// Express an absolute path under the root as a root-relative string
    pub fn relative_display(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn guard() -> (tempfile::TempDir, PathGuard) {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        (dir, guard)
    }

    #[rstest]
    #[case("../../etc/passwd")]
    #[case("/etc/passwd")]
    #[case("docs/../../outside.pdf")]
    #[case("..")]
    #[case("a/b/../c.pdf")]
    fn test_rejects_escapes(#[case] input: &str) {
        let (_dir, guard) = guard();
        let result = guard.resolve(input);
        assert!(
            matches!(result, Err(Error::PathTraversal { .. })),
            "{} should be rejected, got {:?}",
            input,
            result
        );
    }

    #[rstest]
    #[case("a.pdf", "a.pdf")]
    #[case("./a.pdf", "a.pdf")]
    #[case("docs/./report.pdf", "docs/report.pdf")]
    fn test_resolves_inside_root(#[case] input: &str, #[case] expected: &str) {
        let (_dir, guard) = guard();
        let resolved = guard.resolve(input).unwrap();
        assert!(resolved.starts_with(guard.root()));
        assert_eq!(resolved, guard.root().join(expected));
    }

    #[test]
    fn test_empty_path() {
        let (_dir, guard) = guard();
        assert!(matches!(
            guard.resolve("   "),
            Err(Error::FileNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let (dir, guard) = guard();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.pdf"), b"%PDF-1.4").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = guard.resolve("link/secret.pdf");
        assert!(matches!(result, Err(Error::PathTraversal { .. })));
    }

    #[test]
    fn test_relative_display() {
        let (_dir, guard) = guard();
        let path = guard.root().join("docs").join("a.pdf");
        assert_eq!(guard.relative_display(&path).as_deref(), Some("docs/a.pdf"));
    }
}
