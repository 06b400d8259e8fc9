//! Path traversal protection for vault operations.
//!
//! Every path that reaches the watch stabilizer or the indexing pipeline
//! is validated against the vault root before any filesystem access. The
//! check is purely lexical — a rejected path is never touched.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve a user- or watcher-supplied path against the vault root and
/// verify it stays inside. Returns the vault-relative path on success.
///
/// Accepts both absolute paths (as delivered by filesystem watchers) and
/// vault-relative paths (as supplied by callers). `..` components are
/// normalized lexically; anything escaping the root is rejected.
pub fn validate_vault_path(path: &Path, vault_root: &Path) -> Result<PathBuf> {
    let candidate = if path.is_absolute() {
        match path.strip_prefix(vault_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                return Err(Error::PathSecurity {
                    path: path.display().to_string(),
                    root: vault_root.to_path_buf(),
                })
            }
        }
    } else {
        path.to_path_buf()
    };

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(Error::PathSecurity {
                        path: path.display().to_string(),
                        root: vault_root.to_path_buf(),
                    });
                }
            }
            // RootDir/Prefix after strip_prefix means the path was
            // absolute but outside the vault on a different prefix.
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathSecurity {
                    path: path.display().to_string(),
                    root: vault_root.to_path_buf(),
                })
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::PathSecurity {
            path: path.display().to_string(),
            root: vault_root.to_path_buf(),
        });
    }

    Ok(normalized)
}
