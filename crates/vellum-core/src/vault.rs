//! Vault iteration.

use std::path::Path;

use tracing::warn;

use crate::config::WatchConfig;

/// Vault-relative paths of every note under `root`, excluded folders
/// skipped. Sorted, so callers process notes in a deterministic order.
pub fn list_notes(root: &Path, config: &WatchConfig) -> Vec<String> {
    let mut notes = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                if !config.excluded_folders.contains(&name) {
                    stack.push(path);
                }
                continue;
            }
            let is_note = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| config.note_extensions.contains(&e.to_lowercase()))
                .unwrap_or(false);
            if is_note {
                if let Ok(rel) = path.strip_prefix(root) {
                    notes.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
    notes.sort();
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_list_notes_skips_excluded_and_non_notes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("00-inbox")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("00-inbox/a.md"), "x").unwrap();
        fs::write(root.join("b.markdown"), "x").unwrap();
        fs::write(root.join("c.txt"), "x").unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "x").unwrap();

        let notes = list_notes(root, &WatchConfig::default());
        assert_eq!(notes, vec!["00-inbox/a.md", "b.markdown"]);
    }
}
