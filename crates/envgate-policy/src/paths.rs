// paths.rs — Path canonicalization shared by the catalog and the evaluator.
//
// Roots are canonicalized once at load time and every checked path is
// canonicalized the same way, so a `starts_with` comparison is meaningful.
// Paths that do not exist yet (write targets) are resolved through their
// deepest existing ancestor.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` to a canonical absolute path.
///
/// Relative paths are joined onto `base`. `.` is dropped; `..` pops after the
/// path so far has been canonicalized, which matches how the kernel walks a
/// `..` that follows a symlink. Trailing slashes disappear because
/// [`Path::components`] ignores them.
pub fn resolve(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out = canonicalize_existing(&out);
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    canonicalize_existing(&out)
}

/// Canonicalize the deepest existing ancestor of `path` and re-attach the
/// components below it that do not exist yet.
pub fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        if let Ok(mut canonical) = existing.canonicalize() {
            for name in missing.iter().rev() {
                canonical.push(name);
            }
            return canonical;
        }
        match existing.file_name() {
            Some(name) => {
                missing.push(name.to_os_string());
                existing.pop();
            }
            None => return path.to_path_buf(),
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Number of components in a path; deeper roots are more specific.
pub(crate) fn depth(path: &Path) -> usize {
    path.components().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parent_dirs_fold_away() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("a/b")).unwrap();

        let resolved = resolve(Path::new("a/b/../../c.txt"), &base);
        assert_eq!(resolved, base.join("c.txt"));
    }

    #[test]
    fn traversal_cannot_climb_past_root() {
        let resolved = resolve(Path::new("/../../../etc/passwd"), Path::new("/"));
        assert!(resolved.ends_with("passwd"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }

    #[test]
    fn missing_components_are_kept() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();

        let resolved = resolve(Path::new("new/dir/file.txt"), &base);
        assert_eq!(resolved, base.join("new/dir/file.txt"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let raw = format!("{}/", base.display());

        assert_eq!(resolve(Path::new(&raw), Path::new("/")), base);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_resolved() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("real")).unwrap();
        std::os::unix::fs::symlink(base.join("real"), base.join("link")).unwrap();

        let resolved = resolve(Path::new("link/file.txt"), &base);
        assert_eq!(resolved, base.join("real/file.txt"));
    }

    #[test]
    fn home_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/work"), home.join("work"));
        }
        assert_eq!(expand_home("/srv/work"), PathBuf::from("/srv/work"));
    }
}
