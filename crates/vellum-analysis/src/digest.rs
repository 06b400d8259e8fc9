//! Vault activity digest — metadata only, no model calls.
//!
//! Everything is computed from file timestamps, the entity graph, and
//! vectors already in the store: activity in the period, trending
//! entities, unlinked high-similarity pairs, and orphan notes. The
//! report can be rendered to markdown and saved into the vault.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use vellum_core::{list_notes, parse_note, DigestConfig, Note, Result, WatchConfig};
use vellum_graph::GraphStore;
use vellum_index::VectorStore;

/// An entity whose mention frequency rose against the previous window.
#[derive(Debug, Clone, Serialize)]
pub struct TrendingEntity {
    pub name: String,
    pub current_count: usize,
    pub previous_count: usize,
    pub delta: usize,
}

/// A high-similarity pair of notes that are not yet wikilinked.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedConnection {
    pub note_a: String,
    pub note_b: String,
    pub similarity: f32,
}

/// Full vault activity digest for one period.
#[derive(Debug, Clone, Serialize)]
pub struct DigestReport {
    pub generated_at: DateTime<Utc>,
    pub period_days: u64,
    pub new_notes: Vec<String>,
    pub modified_notes: Vec<String>,
    pub trending_entities: Vec<TrendingEntity>,
    pub suggested_connections: Vec<SuggestedConnection>,
    pub orphan_notes: Vec<String>,
    pub total_notes: usize,
    pub total_entities: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Activity {
    New,
    Modified,
    Quiet,
}

fn classify_activity(
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    period_start: DateTime<Utc>,
) -> Activity {
    match (created, modified) {
        (Some(c), _) if c >= period_start => Activity::New,
        (_, Some(m)) if m >= period_start => Activity::Modified,
        _ => Activity::Quiet,
    }
}

struct LoadedNote {
    note: Note,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

/// Generates [`DigestReport`]s from vault metadata, the graph, and the
/// vector store.
pub struct DigestGenerator {
    vault_root: PathBuf,
    watch: WatchConfig,
    store: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    config: DigestConfig,
}

impl DigestGenerator {
    pub fn new(
        vault_root: PathBuf,
        watch: WatchConfig,
        store: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        config: DigestConfig,
    ) -> Self {
        Self {
            vault_root,
            watch,
            store,
            graph,
            config,
        }
    }

    pub async fn generate(&self) -> Result<DigestReport> {
        let now = Utc::now();
        let period = chrono::Duration::days(self.config.period_days as i64);
        let period_start = now - period;
        let prev_start = period_start - period;

        let notes = self.load_notes().await;

        let mut new_notes = Vec::new();
        let mut modified_notes = Vec::new();
        let mut active_paths = Vec::new();
        for loaded in &notes {
            match classify_activity(loaded.created, loaded.modified, period_start) {
                Activity::New => {
                    new_notes.push(loaded.note.title.clone());
                    active_paths.push(loaded.note.path.clone());
                }
                Activity::Modified => {
                    modified_notes.push(loaded.note.title.clone());
                    active_paths.push(loaded.note.path.clone());
                }
                Activity::Quiet => {}
            }
        }

        let trending_entities = self.compute_trending(&notes, period_start, prev_start).await?;
        let suggested_connections = self.compute_connections(&notes, &active_paths).await?;
        let orphan_notes = compute_orphans(notes.iter().map(|l| &l.note));
        let total_entities = self.graph.entity_count().await?;

        Ok(DigestReport {
            generated_at: now,
            period_days: self.config.period_days,
            new_notes,
            modified_notes,
            trending_entities,
            suggested_connections,
            orphan_notes,
            total_notes: notes.len(),
            total_entities,
        })
    }

    /// Render the report as a markdown note with frontmatter.
    pub fn format_markdown(&self, report: &DigestReport) -> String {
        let date = report.generated_at.format("%Y-%m-%d");
        let generated = report.generated_at.format("%Y-%m-%dT%H:%M:%SZ");

        let mut lines = vec![
            "---".to_string(),
            format!("title: Daily Digest {date}"),
            format!("date: {date}"),
            "tags: [digest, auto-generated]".to_string(),
            format!("generated_at: {generated}"),
            format!("period_days: {}", report.period_days),
            "---".to_string(),
            String::new(),
            format!("# Daily Digest {date}"),
            String::new(),
        ];

        if !report.new_notes.is_empty() || !report.modified_notes.is_empty() {
            lines.push("## Activity".to_string());
            lines.push(String::new());
            if !report.new_notes.is_empty() {
                lines.push(format!("**New notes ({})**", report.new_notes.len()));
                lines.push(String::new());
                lines.extend(report.new_notes.iter().map(|t| format!("- {t}")));
                lines.push(String::new());
            }
            if !report.modified_notes.is_empty() {
                lines.push(format!("**Modified notes ({})**", report.modified_notes.len()));
                lines.push(String::new());
                lines.extend(report.modified_notes.iter().map(|t| format!("- {t}")));
                lines.push(String::new());
            }
        }

        if !report.trending_entities.is_empty() {
            lines.push("## Trending Topics".to_string());
            lines.push(String::new());
            for entity in &report.trending_entities {
                lines.push(format!("- **{}** (+{} mentions)", entity.name, entity.delta));
            }
            lines.push(String::new());
        }

        if !report.suggested_connections.is_empty() {
            lines.push("## Suggested Connections".to_string());
            lines.push(String::new());
            for conn in &report.suggested_connections {
                let pct = (conn.similarity * 100.0) as u32;
                lines.push(format!(
                    "- [[{}]] and [[{}]] ({pct}% similarity)",
                    conn.note_a, conn.note_b
                ));
            }
            lines.push(String::new());
        }

        if !report.orphan_notes.is_empty() {
            lines.push("## Orphan Notes".to_string());
            lines.push(String::new());
            lines.extend(report.orphan_notes.iter().map(|t| format!("- [[{t}]]")));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
        lines.push(format!(
            "*{} total notes, {} entities, last {} days*",
            report.total_notes, report.total_entities, report.period_days
        ));

        lines.join("\n")
    }

    /// Write the digest to `<vault>/_meta/digests/YYYY-MM-DD.md`.
    pub async fn save_to_vault(&self, report: &DigestReport) -> Result<PathBuf> {
        let digest_dir = self.vault_root.join("_meta").join("digests");
        tokio::fs::create_dir_all(&digest_dir).await?;
        let dest = digest_dir.join(format!("{}.md", report.generated_at.format("%Y-%m-%d")));
        tokio::fs::write(&dest, self.format_markdown(report)).await?;
        info!(path = %dest.display(), "Digest saved");
        Ok(dest)
    }

    async fn load_notes(&self) -> Vec<LoadedNote> {
        let mut notes = Vec::new();
        for path in list_notes(&self.vault_root, &self.watch) {
            let abs = self.vault_root.join(&path);
            let raw = match tokio::fs::read_to_string(&abs).await {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let note = match parse_note(Path::new(&path), &raw) {
                Ok(note) => note,
                Err(e) => {
                    warn!(note_path = %path, error = %e, "Skipping unparseable note in digest");
                    continue;
                }
            };
            let meta = tokio::fs::metadata(&abs).await.ok();
            let modified = meta
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);
            // Creation time is unavailable on some filesystems; fall back
            // to mtime so fresh files still count as new.
            let created = meta
                .as_ref()
                .and_then(|m| m.created().ok())
                .map(DateTime::<Utc>::from)
                .or(modified);
            notes.push(LoadedNote {
                note,
                created,
                modified,
            });
        }
        notes
    }

    /// Entity mention counts in the current window vs the previous one.
    async fn compute_trending(
        &self,
        notes: &[LoadedNote],
        period_start: DateTime<Utc>,
        prev_start: DateTime<Utc>,
    ) -> Result<Vec<TrendingEntity>> {
        let mut current: HashMap<String, usize> = HashMap::new();
        let mut previous: HashMap<String, usize> = HashMap::new();

        for loaded in notes {
            let Some(modified) = loaded.modified else {
                continue;
            };
            let bucket = if modified >= period_start {
                &mut current
            } else if modified >= prev_start {
                &mut previous
            } else {
                continue;
            };
            for entity in self.graph.entities_for_note(&loaded.note.path).await? {
                *bucket.entry(entity).or_insert(0) += 1;
            }
        }

        let mut trending: Vec<TrendingEntity> = current
            .into_iter()
            .filter_map(|(name, current_count)| {
                let previous_count = previous.get(&name).copied().unwrap_or(0);
                (current_count > previous_count).then(|| TrendingEntity {
                    delta: current_count - previous_count,
                    name,
                    current_count,
                    previous_count,
                })
            })
            .collect();
        trending.sort_by(|a, b| b.delta.cmp(&a.delta).then_with(|| a.name.cmp(&b.name)));
        trending.truncate(self.config.max_trending);
        Ok(trending)
    }

    /// High-similarity pairs among period-active notes that no wikilink
    /// connects yet.
    async fn compute_connections(
        &self,
        notes: &[LoadedNote],
        active_paths: &[String],
    ) -> Result<Vec<SuggestedConnection>> {
        let titles: HashMap<&str, &str> = notes
            .iter()
            .map(|l| (l.note.path.as_str(), l.note.title.as_str()))
            .collect();
        let links: HashMap<&str, HashSet<&str>> = notes
            .iter()
            .map(|l| {
                (
                    l.note.title.as_str(),
                    l.note.wikilinks.iter().map(String::as_str).collect(),
                )
            })
            .collect();

        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
        let mut suggestions = Vec::new();

        for path in active_paths {
            let Some(&title) = titles.get(path.as_str()) else {
                continue;
            };
            for (_, vector) in self.store.chunks_for_note(path).await? {
                for hit in self.store.query(&vector, 20, Some(path.as_str())).await? {
                    if hit.score < self.config.connection_min
                        || hit.score >= self.config.connection_max
                    {
                        continue;
                    }
                    let other = hit.metadata.note_title;
                    let pair = if title < other.as_str() {
                        (title.to_string(), other.clone())
                    } else {
                        (other.clone(), title.to_string())
                    };
                    if !seen_pairs.insert(pair) {
                        continue;
                    }
                    let already_linked = links
                        .get(title)
                        .is_some_and(|set| set.contains(other.as_str()))
                        || links
                            .get(other.as_str())
                            .is_some_and(|set| set.contains(title));
                    if already_linked {
                        continue;
                    }
                    suggestions.push(SuggestedConnection {
                        note_a: title.to_string(),
                        note_b: other,
                        similarity: hit.score,
                    });
                }
            }
        }

        suggestions.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions.truncate(self.config.max_suggestions);
        Ok(suggestions)
    }
}

/// Notes with zero wikilinks in or out among known titles.
fn compute_orphans<'a>(notes: impl Iterator<Item = &'a Note> + Clone) -> Vec<String> {
    let all_titles: HashSet<&str> = notes.clone().map(|n| n.title.as_str()).collect();
    let mut linked: HashSet<&str> = HashSet::new();
    for note in notes.clone() {
        for link in &note.wikilinks {
            if all_titles.contains(link.as_str()) {
                linked.insert(link.as_str());
                linked.insert(note.title.as_str());
            }
        }
    }
    let mut orphans: Vec<String> = notes
        .filter(|n| !linked.contains(n.title.as_str()))
        .map(|n| n.title.clone())
        .collect();
    orphans.sort();
    orphans
}
