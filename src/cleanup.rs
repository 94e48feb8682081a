/**
 * Post-run removal of source directories left empty
 */

use log::{debug, warn};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Remove empty directories below `root`, deepest first. `root` itself is
/// kept. Returns the number of directories removed.
pub fn prune_empty_dirs(root: &Path) -> usize {
    let mut removed = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let is_empty = match fs::read_dir(entry.path()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => {
                warn!("Failed to read directory {}: {}", entry.path().display(), e);
                continue;
            }
        };

        if is_empty {
            match fs::remove_dir(entry.path()) {
                Ok(()) => {
                    debug!("Removed empty directory: {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove directory {}: {}", entry.path().display(), e),
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_nested_empty_dirs_but_keeps_root() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("a/b/c")).unwrap();
        fs::create_dir_all(root.path().join("d")).unwrap();
        fs::create_dir_all(root.path().join("e/f")).unwrap();
        fs::write(root.path().join("e/keep.jpg"), b"x").unwrap();

        let removed = prune_empty_dirs(root.path());

        assert_eq!(removed, 5);
        assert!(root.path().is_dir());
        assert!(!root.path().join("a").exists());
        assert!(!root.path().join("d").exists());
        assert!(!root.path().join("e/f").exists());
        assert!(root.path().join("e/keep.jpg").exists());
    }

    #[test]
    fn empty_root_is_kept() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(prune_empty_dirs(root.path()), 0);
        assert!(root.path().is_dir());
    }
}
