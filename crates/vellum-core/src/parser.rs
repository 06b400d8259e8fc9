//! Note parser — extracts YAML frontmatter and body structure from raw
//! markdown text.
//!
//! Parsing is pure (no filesystem access); the indexing pipeline reads
//! the file and hands the raw text here. Malformed frontmatter yields
//! [`Error::Parse`], which the pipeline logs and skips — a bad note
//! never takes down the watcher.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::note::Note;

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)(?:^|\s)#([a-zA-Z][a-zA-Z0-9_/-]*)").unwrap())
}

fn wikilink_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]+)?\]\]").unwrap())
}

/// Parse raw note text into a [`Note`].
///
/// `path` must already be vault-relative (see
/// [`crate::security::validate_vault_path`]).
pub fn parse_note(path: &Path, raw: &str) -> Result<Note> {
    let (frontmatter, body) = split_frontmatter(raw)?;

    let path_str = path.to_string_lossy().replace('\\', "/");

    let title = frontmatter
        .get("title")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().replace(['-', '_'], " "))
                .unwrap_or_else(|| path_str.clone())
        });

    let mut tags = string_list(&frontmatter, "tags");
    for cap in tag_pattern().captures_iter(body) {
        let tag = cap[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let entities = string_list(&frontmatter, "entities");

    let wikilinks = wikilink_pattern()
        .captures_iter(body)
        .map(|cap| cap[1].trim().to_string())
        .collect();

    let modified = frontmatter
        .get("modified")
        .and_then(|v| v.as_str())
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(Note {
        path: path_str,
        title,
        body: body.to_string(),
        frontmatter,
        tags,
        entities,
        wikilinks,
        modified,
    })
}

/// Split raw text into (frontmatter map, body). Text without a leading
/// `---` delimiter has no frontmatter; an opening delimiter without a
/// closing one is malformed.
fn split_frontmatter(raw: &str) -> Result<(BTreeMap<String, serde_yaml::Value>, &str)> {
    let Some(rest) = raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n")) else {
        return Ok((BTreeMap::new(), raw));
    };

    // The closing delimiter may be the very next line (empty block).
    let (yaml_end, mut body_start) = if rest.starts_with("---") {
        (0, "---".len())
    } else if let Some(i) = rest.find("\n---") {
        (i, i + "\n---".len())
    } else {
        return Err(Error::Parse("unterminated frontmatter block".to_string()));
    };
    // Skip the delimiter's trailing newline if present.
    let tail = &rest[body_start..];
    if let Some(stripped) = tail.strip_prefix("\r\n").or_else(|| tail.strip_prefix("\n")) {
        body_start = rest.len() - stripped.len();
    }

    let yaml = &rest[..yaml_end];
    let frontmatter: BTreeMap<String, serde_yaml::Value> = if yaml.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_yaml::from_str(yaml)?
    };

    Ok((frontmatter, &rest[body_start..]))
}

/// Read a frontmatter field that may be a single string or a sequence.
fn string_list(map: &BTreeMap<String, serde_yaml::Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(serde_yaml::Value::String(s)) => vec![s.clone()],
        Some(serde_yaml::Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_without_frontmatter() {
        let note = parse_note(&PathBuf::from("00-inbox/x.md"), "# A\ntext").unwrap();
        assert_eq!(note.path, "00-inbox/x.md");
        assert_eq!(note.title, "x");
        assert_eq!(note.body, "# A\ntext");
        assert!(note.frontmatter.is_empty());
    }

    #[test]
    fn test_parse_with_frontmatter() {
        let raw = "---\ntitle: Alpha\ntags:\n  - rust\n  - notes\nentities:\n  - Tokio\n---\nbody text";
        let note = parse_note(&PathBuf::from("a.md"), raw).unwrap();
        assert_eq!(note.title, "Alpha");
        assert_eq!(note.body, "body text");
        assert!(note.tags.contains(&"rust".to_string()));
        assert_eq!(note.entities, vec!["Tokio"]);
    }

    #[test]
    fn test_inline_tags_merged() {
        let raw = "---\ntags: [one]\n---\nSome #two content #one";
        let note = parse_note(&PathBuf::from("a.md"), raw).unwrap();
        assert_eq!(note.tags, vec!["one", "two"]);
    }

    #[test]
    fn test_wikilinks_extracted() {
        let raw = "See [[Other Note]] and [[target|alias]].";
        let note = parse_note(&PathBuf::from("a.md"), raw).unwrap();
        assert_eq!(note.wikilinks, vec!["Other Note", "target"]);
    }

    #[test]
    fn test_empty_frontmatter_block() {
        let note = parse_note(&PathBuf::from("a.md"), "---\n---\n# A\ntext").unwrap();
        assert!(note.frontmatter.is_empty());
        assert_eq!(note.body, "# A\ntext");
    }

    #[test]
    fn test_unterminated_frontmatter_is_parse_error() {
        let raw = "---\ntitle: broken\nbody without closing delimiter";
        let err = parse_note(&PathBuf::from("a.md"), raw).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let raw = "---\ntitle: [unclosed\n---\nbody";
        let err = parse_note(&PathBuf::from("a.md"), raw).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_title_fallback_from_stem() {
        let note = parse_note(&PathBuf::from("02-projects/my-big_idea.md"), "text").unwrap();
        assert_eq!(note.title, "my big idea");
    }

    #[test]
    fn test_scalar_tags_field() {
        let raw = "---\ntags: solo\n---\nbody";
        let note = parse_note(&PathBuf::from("a.md"), raw).unwrap();
        assert_eq!(note.tags, vec!["solo"]);
    }
}
