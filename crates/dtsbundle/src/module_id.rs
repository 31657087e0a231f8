//! Module-identifier computation and path normalization.
//!
//! Bundled modules are addressed by flattened identifiers of the form
//! `<library name><relative path from the base directory, minus the
//! declaration suffix>`, always `/`-separated regardless of the host's
//! native path separator.

use std::{
    borrow::Cow,
    path::{Component, MAIN_SEPARATOR, Path, PathBuf},
};

use cow_utils::CowUtils;

/// Convert a filesystem path string into a `/`-separated identifier.
///
/// On hosts whose native separator already is `/` this is the identity
/// function and does not allocate.
pub fn normalize_slashes(filename: &str) -> Cow<'_, str> {
    if MAIN_SEPARATOR == '/' {
        Cow::Borrowed(filename)
    } else {
        filename.cow_replace(MAIN_SEPARATOR, "/")
    }
}

/// Strip the declaration suffix (`.d.ts`, or a bare `.ts`) from a path.
fn strip_declaration_suffix(filename: &str) -> &str {
    filename
        .strip_suffix(".d.ts")
        .or_else(|| filename.strip_suffix(".ts"))
        .unwrap_or(filename)
}

/// Compute the module identifier for a file under the base directory.
///
/// `base_dir` and `filename` must both be slash-normalized absolute
/// paths; the relative part keeps its leading `/`, so the identifier
/// reads `name/relative/path`.
pub fn module_id(name: &str, base_dir: &str, filename: &str) -> String {
    let relative = filename.strip_prefix(base_dir).unwrap_or(filename);
    format!("{name}{}", strip_declaration_suffix(relative))
}

/// Join a relative import specifier onto the directory of a module
/// identifier, resolving `.` and `..` segments textually.
///
/// A reference `./foo` inside the module `lib/a/b` yields `lib/a/foo`.
pub fn join_module_id(current_id: &str, specifier: &str) -> String {
    let dir = current_id.rsplit_once('/').map_or("", |(dir, _)| dir);
    let mut segments: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Lexically normalize a path: drop `.` components and resolve `..`
/// against preceding components. No filesystem access, no symlink
/// resolution, so identifiers stay stable across runs.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve `path` against `base` when relative, then normalize.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_identity_on_forward_slashes() {
        let path = "/projects/lib/src/a.d.ts";
        assert_eq!(normalize_slashes(path), path);
    }

    #[test]
    fn module_ids_strip_the_declaration_suffix() {
        assert_eq!(module_id("mylib", "/base", "/base/a.d.ts"), "mylib/a");
        assert_eq!(module_id("mylib", "/base", "/base/sub/b.ts"), "mylib/sub/b");
    }

    #[test]
    fn module_ids_are_unique_per_file() {
        let a = module_id("mylib", "/base", "/base/a.d.ts");
        let b = module_id("mylib", "/base", "/base/sub/a.d.ts");
        assert_ne!(a, b);
    }

    #[test]
    fn join_is_directory_relative() {
        assert_eq!(join_module_id("lib/a/b", "./foo"), "lib/a/foo");
        assert_eq!(join_module_id("lib/a/b", "../foo"), "lib/foo");
        assert_eq!(join_module_id("lib/a", "./x/y"), "lib/x/y");
    }

    #[test]
    fn join_saturates_past_the_library_root() {
        assert_eq!(join_module_id("lib/a", "../../x"), "../x");
    }

    #[test]
    fn normalize_path_resolves_dot_segments() {
        assert_eq!(normalize_path(Path::new("/base/./a/../b.d.ts")), PathBuf::from("/base/b.d.ts"));
    }
}
