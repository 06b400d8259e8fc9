//! Vocabulary-constrained auto-tagging with a quarantine for new tags.
//!
//! A [`TagClassifier`] proposes tags for a note against the vault's
//! existing tag vocabulary. Proposals already in the vocabulary are
//! suggested directly; unseen tags are quarantined and only count as
//! vocabulary once approved. Nothing is written to a note except through
//! [`AutoTagger::apply_tags`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use vellum_core::{
    parse_note, validate_vault_path, AutoTagConfig, Note, NoteEvent, NoteEventHandler, Result,
};

/// A classifier's raw proposal for one note.
#[derive(Debug, Clone, Default)]
pub struct TagProposal {
    /// Proposed tags, expected to come from the vocabulary.
    pub tags: Vec<String>,
    /// Tags outside the vocabulary the classifier wants to introduce.
    pub new_tags: Vec<String>,
}

/// Proposes tags for a note given the current vault vocabulary.
#[async_trait]
pub trait TagClassifier: Send + Sync {
    async fn classify(
        &self,
        note: &Note,
        vocabulary: &[String],
        max_tags: usize,
    ) -> Result<TagProposal>;
}

/// Classifier that assigns vocabulary tags literally mentioned in the
/// note. Purely structural; never proposes new tags.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

#[async_trait]
impl TagClassifier for KeywordClassifier {
    async fn classify(
        &self,
        note: &Note,
        vocabulary: &[String],
        max_tags: usize,
    ) -> Result<TagProposal> {
        let haystack = format!("{} {}", note.title, note.body).to_lowercase();
        let tags = vocabulary
            .iter()
            .filter(|tag| !note.tags.contains(tag))
            .filter(|tag| {
                // "machine-learning" matches either spelling in prose.
                haystack.contains(tag.as_str()) || haystack.contains(&tag.replace('-', " "))
            })
            .take(max_tags)
            .cloned()
            .collect();
        Ok(TagProposal {
            tags,
            new_tags: Vec::new(),
        })
    }
}

/// New-tag quarantine: approved tags count as vocabulary, quarantined
/// tags wait for a decision.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QuarantineState {
    pub approved: BTreeSet<String>,
    pub quarantined: BTreeSet<String>,
}

impl QuarantineState {
    pub fn approve(&mut self, tag: &str) {
        self.quarantined.remove(tag);
        self.approved.insert(tag.to_string());
    }

    pub fn reject(&mut self, tag: &str) {
        self.quarantined.remove(tag);
    }

    pub fn approve_all(&mut self) {
        let drained = std::mem::take(&mut self.quarantined);
        self.approved.extend(drained);
    }
}

/// Tag suggestion for a single note.
#[derive(Debug, Clone, Serialize)]
pub struct TagSuggestion {
    pub note_path: String,
    pub note_title: String,
    pub existing_tags: Vec<String>,
    /// Vocabulary tags proposed for the note.
    pub suggested_tags: Vec<String>,
    /// Out-of-vocabulary tags, now quarantined.
    pub new_tags: Vec<String>,
}

struct TaggerState {
    vocabulary: BTreeSet<String>,
    quarantine: QuarantineState,
}

/// Classifies notes against the vault tag vocabulary, quarantining any
/// new tags the classifier invents.
pub struct AutoTagger {
    vault_root: PathBuf,
    config: AutoTagConfig,
    classifier: Arc<dyn TagClassifier>,
    quarantine_path: PathBuf,
    state: Mutex<TaggerState>,
}

impl AutoTagger {
    /// Quarantine state is loaded from `quarantine_path` when present.
    pub fn new(
        vault_root: PathBuf,
        config: AutoTagConfig,
        classifier: Arc<dyn TagClassifier>,
        quarantine_path: PathBuf,
    ) -> Result<Self> {
        let quarantine = match std::fs::read_to_string(&quarantine_path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QuarantineState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            vault_root,
            config,
            classifier,
            quarantine_path,
            state: Mutex::new(TaggerState {
                vocabulary: BTreeSet::new(),
                quarantine,
            }),
        })
    }

    /// Fold a note's own tags into the vault vocabulary.
    pub fn observe_tags(&self, note: &Note) {
        let mut state = self.state.lock().expect("tagger state poisoned");
        state.vocabulary.extend(note.tags.iter().cloned());
    }

    /// Current vocabulary: observed vault tags plus approved new tags.
    pub fn vocabulary(&self) -> Vec<String> {
        let state = self.state.lock().expect("tagger state poisoned");
        state
            .vocabulary
            .union(&state.quarantine.approved)
            .cloned()
            .collect()
    }

    pub fn quarantined(&self) -> Vec<String> {
        let state = self.state.lock().expect("tagger state poisoned");
        state.quarantine.quarantined.iter().cloned().collect()
    }

    pub fn approve(&self, tag: &str) -> Result<()> {
        self.state
            .lock()
            .expect("tagger state poisoned")
            .quarantine
            .approve(tag);
        self.save_quarantine()
    }

    pub fn reject(&self, tag: &str) -> Result<()> {
        self.state
            .lock()
            .expect("tagger state poisoned")
            .quarantine
            .reject(tag);
        self.save_quarantine()
    }

    pub fn approve_all(&self) -> Result<()> {
        self.state
            .lock()
            .expect("tagger state poisoned")
            .quarantine
            .approve_all();
        self.save_quarantine()
    }

    /// Suggest tags for `note`. `None` when the body is too short to
    /// classify. Out-of-vocabulary proposals are quarantined, not
    /// suggested.
    pub async fn suggest_tags(&self, note: &Note) -> Result<Option<TagSuggestion>> {
        if note.body.trim().len() < self.config.min_content_length {
            return Ok(None);
        }
        let vocabulary = self.vocabulary();
        let proposal = self
            .classifier
            .classify(note, &vocabulary, self.config.max_tags_per_note)
            .await?;

        let mut suggested = Vec::new();
        let mut novel = Vec::new();
        for tag in proposal.tags.into_iter().take(self.config.max_tags_per_note) {
            if vocabulary.contains(&tag) {
                suggested.push(tag);
            } else if !tag.is_empty() {
                novel.push(tag);
            }
        }
        // At most one genuinely new tag per note, to keep the vocabulary
        // from sprawling.
        for tag in proposal.new_tags.into_iter().take(1) {
            if !tag.is_empty() && !novel.contains(&tag) {
                novel.push(tag);
            }
        }

        if !novel.is_empty() {
            {
                let mut state = self.state.lock().expect("tagger state poisoned");
                for tag in &novel {
                    if !state.quarantine.approved.contains(tag) {
                        state.quarantine.quarantined.insert(tag.clone());
                    }
                }
            }
            self.save_quarantine()?;
        }

        Ok(Some(TagSuggestion {
            note_path: note.path.clone(),
            note_title: note.title.clone(),
            existing_tags: note.tags.clone(),
            suggested_tags: suggested,
            new_tags: novel,
        }))
    }

    /// Merge `tags` into the note's frontmatter and rewrite the file.
    /// Existing tags are kept, duplicates dropped.
    pub async fn apply_tags(&self, path: &str, tags: &[String]) -> Result<()> {
        let rel = validate_vault_path(Path::new(path), &self.vault_root)?;
        let abs = self.vault_root.join(&rel);
        let raw = tokio::fs::read_to_string(&abs).await?;
        let note = parse_note(&rel, &raw)?;

        let mut merged = note.tags.clone();
        for tag in tags {
            if !merged.contains(tag) {
                merged.push(tag.clone());
            }
        }
        let mut frontmatter = note.frontmatter.clone();
        frontmatter.insert(
            "tags".to_string(),
            serde_yaml::Value::Sequence(
                merged.into_iter().map(serde_yaml::Value::String).collect(),
            ),
        );

        let yaml = serde_yaml::to_string(&frontmatter)?;
        tokio::fs::write(&abs, format!("---\n{yaml}---\n{}", note.body)).await?;
        info!(note_path = path, ?tags, "Applied tags");
        Ok(())
    }

    fn save_quarantine(&self) -> Result<()> {
        let json = {
            let state = self.state.lock().expect("tagger state poisoned");
            serde_json::to_string_pretty(&state.quarantine)?
        };
        if let Some(parent) = self.quarantine_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.quarantine_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl NoteEventHandler for AutoTagger {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        let NoteEvent::Indexed { path, .. } = event else {
            return Ok(());
        };
        let rel = validate_vault_path(Path::new(&path), &self.vault_root)?;
        let raw = match tokio::fs::read_to_string(self.vault_root.join(&rel)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let note = parse_note(&rel, &raw)?;
        self.observe_tags(&note);

        if let Some(suggestion) = self.suggest_tags(&note).await? {
            if !suggestion.suggested_tags.is_empty() || !suggestion.new_tags.is_empty() {
                info!(
                    note_path = %suggestion.note_path,
                    suggested = ?suggestion.suggested_tags,
                    quarantined = ?suggestion.new_tags,
                    "Tag suggestions"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct ScriptedClassifier {
        proposal: TagProposal,
    }

    #[async_trait]
    impl TagClassifier for ScriptedClassifier {
        async fn classify(
            &self,
            _note: &Note,
            _vocabulary: &[String],
            _max_tags: usize,
        ) -> Result<TagProposal> {
            Ok(self.proposal.clone())
        }
    }

    fn loose_config() -> AutoTagConfig {
        AutoTagConfig {
            min_content_length: 0,
            max_tags_per_note: 3,
        }
    }

    fn note(path: &str, body: &str, tags: &[&str]) -> Note {
        let mut note = parse_note(Path::new(path), body).unwrap();
        note.tags = tags.iter().map(|t| t.to_string()).collect();
        note
    }

    fn tagger_with(classifier: Arc<dyn TagClassifier>) -> (tempfile::TempDir, AutoTagger) {
        let dir = tempfile::tempdir().unwrap();
        let quarantine = dir.path().join("data/quarantine.json");
        let tagger = AutoTagger::new(
            dir.path().to_path_buf(),
            loose_config(),
            classifier,
            quarantine,
        )
        .unwrap();
        (dir, tagger)
    }

    #[tokio::test]
    async fn test_keyword_classifier_matches_vocabulary_in_body() {
        let classifier = KeywordClassifier;
        let subject = note("a.md", "Notes on machine learning and rust.", &[]);
        let vocabulary = vec![
            "machine-learning".to_string(),
            "rust".to_string(),
            "cooking".to_string(),
        ];

        let proposal = classifier.classify(&subject, &vocabulary, 3).await.unwrap();
        assert_eq!(proposal.tags, vec!["machine-learning", "rust"]);
        assert!(proposal.new_tags.is_empty());
    }

    #[tokio::test]
    async fn test_keyword_classifier_skips_already_tagged() {
        let classifier = KeywordClassifier;
        let subject = note("a.md", "More rust content.", &["rust"]);
        let vocabulary = vec!["rust".to_string()];

        let proposal = classifier.classify(&subject, &vocabulary, 3).await.unwrap();
        assert!(proposal.tags.is_empty());
    }

    #[tokio::test]
    async fn test_new_tags_are_quarantined_not_suggested() {
        let (_dir, tagger) = tagger_with(Arc::new(ScriptedClassifier {
            proposal: TagProposal {
                tags: vec!["known".to_string(), "invented".to_string()],
                new_tags: vec!["brand-new".to_string()],
            },
        }));
        tagger.observe_tags(&note("seed.md", "seed", &["known"]));

        let suggestion = tagger
            .suggest_tags(&note("a.md", "body", &[]))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(suggestion.suggested_tags, vec!["known"]);
        assert_eq!(suggestion.new_tags, vec!["invented", "brand-new"]);
        let mut quarantined = tagger.quarantined();
        quarantined.sort();
        assert_eq!(quarantined, vec!["brand-new", "invented"]);

        tagger.reject("invented").unwrap();
        assert_eq!(tagger.quarantined(), vec!["brand-new"]);
    }

    #[tokio::test]
    async fn test_approved_tag_joins_vocabulary() {
        let (_dir, tagger) = tagger_with(Arc::new(ScriptedClassifier {
            proposal: TagProposal {
                tags: vec!["fresh".to_string()],
                new_tags: vec![],
            },
        }));

        let first = tagger
            .suggest_tags(&note("a.md", "body", &[]))
            .await
            .unwrap()
            .unwrap();
        assert!(first.suggested_tags.is_empty());
        assert_eq!(first.new_tags, vec!["fresh"]);

        tagger.approve("fresh").unwrap();
        assert!(tagger.quarantined().is_empty());

        let second = tagger
            .suggest_tags(&note("a.md", "body", &[]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.suggested_tags, vec!["fresh"]);
        assert!(second.new_tags.is_empty());
    }

    #[tokio::test]
    async fn test_quarantine_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let quarantine_path = dir.path().join("quarantine.json");
        let classifier = Arc::new(ScriptedClassifier {
            proposal: TagProposal {
                tags: vec![],
                new_tags: vec!["pending".to_string()],
            },
        });

        let tagger = AutoTagger::new(
            dir.path().to_path_buf(),
            loose_config(),
            classifier.clone(),
            quarantine_path.clone(),
        )
        .unwrap();
        tagger
            .suggest_tags(&note("a.md", "body", &[]))
            .await
            .unwrap();
        drop(tagger);

        let reloaded = AutoTagger::new(
            dir.path().to_path_buf(),
            loose_config(),
            classifier,
            quarantine_path,
        )
        .unwrap();
        assert_eq!(reloaded.quarantined(), vec!["pending"]);
    }

    #[tokio::test]
    async fn test_short_note_not_classified() {
        let dir = tempfile::tempdir().unwrap();
        let tagger = AutoTagger::new(
            dir.path().to_path_buf(),
            AutoTagConfig::default(),
            Arc::new(KeywordClassifier),
            dir.path().join("quarantine.json"),
        )
        .unwrap();

        let result = tagger.suggest_tags(&note("a.md", "tiny", &[])).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_apply_tags_merges_frontmatter() {
        let (dir, tagger) = tagger_with(Arc::new(KeywordClassifier));
        let path = dir.path().join("a.md");
        fs::write(&path, "---\ntags:\n- old\n---\nbody text").unwrap();

        tagger
            .apply_tags("a.md", &["new-tag".to_string(), "old".to_string()])
            .await
            .unwrap();

        let rewritten = fs::read_to_string(&path).unwrap();
        let reparsed = parse_note(Path::new("a.md"), &rewritten).unwrap();
        assert_eq!(reparsed.tags, vec!["old", "new-tag"]);
        assert_eq!(reparsed.body, "body text");
    }
}
