//! Utility functions for the CLI.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Input files sharing one displayed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    /// Directory as shown in the report heading
    pub display: String,
    /// Files in command-line order
    pub files: Vec<PathBuf>,
}

/// Group files by parent directory, in sorted directory order.
///
/// Directories below `base` are shown relative to it; the base itself and
/// bare file names show as `.`.
pub fn group_by_directory(files: &[PathBuf], base: Option<&Path>) -> Vec<DirectoryGroup> {
    let mut dirs: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
        dirs.entry(parent).or_default().push(file.clone());
    }

    let mut groups: Vec<DirectoryGroup> = Vec::new();
    for (dir, files) in dirs {
        let display = display_directory(&dir, base);
        match groups.last_mut() {
            Some(last) if last.display == display => last.files.extend(files),
            _ => groups.push(DirectoryGroup { display, files }),
        }
    }
    groups
}

/// Directory name for a report heading.
pub fn display_directory(dir: &Path, base: Option<&Path>) -> String {
    let relative = base
        .and_then(|base| dir.strip_prefix(base).ok())
        .unwrap_or(dir);

    if relative.as_os_str().is_empty() {
        ".".to_string()
    } else {
        relative.display().to_string()
    }
}

/// Final path component, for report lines and cabinet entry names.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_directory() {
        let files = vec![
            PathBuf::from("b/two.bin"),
            PathBuf::from("a/one.bin"),
            PathBuf::from("top.bin"),
            PathBuf::from("b/three.bin"),
        ];
        let groups = group_by_directory(&files, None);

        let displays: Vec<&str> = groups.iter().map(|g| g.display.as_str()).collect();
        assert_eq!(displays, vec![".", "a", "b"]);
        assert_eq!(
            groups[2].files,
            vec![PathBuf::from("b/two.bin"), PathBuf::from("b/three.bin")]
        );
    }

    #[test]
    fn test_relative_to_base() {
        let base = Path::new("/work/game");
        assert_eq!(display_directory(Path::new("/work/game/audio"), Some(base)), "audio");
        assert_eq!(display_directory(Path::new("/work/game"), Some(base)), ".");
        assert_eq!(display_directory(Path::new("/elsewhere"), Some(base)), "/elsewhere");
        assert_eq!(display_directory(Path::new(""), None), ".");
    }

    #[test]
    fn test_same_display_merges() {
        let files = vec![
            PathBuf::from("/work/x.bin"),
            PathBuf::from("y.bin"),
        ];
        let groups = group_by_directory(&files, Some(Path::new("/work")));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].display, ".");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(Path::new("dir/asset.arc")), "asset.arc");
        assert_eq!(file_name(Path::new("asset")), "asset");
    }
}
