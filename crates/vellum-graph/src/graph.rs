//! Knowledge graph store abstraction and in-memory implementation.
//!
//! Entities are identified by name. Every entity tracks which notes
//! sourced it; removing a source prunes entities no other note still
//! mentions, so a deleted note leaves no orphans behind.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

use vellum_core::Result;

/// Storage for the entity graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Record that `note_path` mentions `entities`, connected by
    /// `relations` (undirected entity pairs). Idempotent per note.
    async fn merge_entities(
        &self,
        note_path: &str,
        entities: &[String],
        relations: &[(String, String)],
    ) -> Result<()>;

    /// Drop `note_path` as a source; entities with no remaining source
    /// are pruned along with their edges.
    async fn remove_source(&self, note_path: &str) -> Result<()>;

    /// Entities directly connected to `entity`. Empty for unknown
    /// entities.
    async fn neighbors(&self, entity: &str) -> Result<HashSet<String>>;

    /// Edge count of the shortest path between two entities, `None` when
    /// unconnected or unknown.
    async fn shortest_path_length(&self, a: &str, b: &str) -> Result<Option<usize>>;

    /// Entities currently attributed to `note_path`.
    async fn entities_for_note(&self, note_path: &str) -> Result<Vec<String>>;

    /// Total entity count.
    async fn entity_count(&self) -> Result<usize>;

    /// Shortest entity-level distance between two notes: the minimum
    /// [`shortest_path_length`](Self::shortest_path_length) over their
    /// entity pairs. `None` when either note has no known entities or no
    /// pair is connected.
    async fn note_distance(&self, a_path: &str, b_path: &str) -> Result<Option<usize>> {
        let a_entities = self.entities_for_note(a_path).await?;
        let b_entities = self.entities_for_note(b_path).await?;
        let mut best: Option<usize> = None;
        for a in &a_entities {
            for b in &b_entities {
                if let Some(distance) = self.shortest_path_length(a, b).await? {
                    best = Some(best.map_or(distance, |current| current.min(distance)));
                }
            }
        }
        Ok(best)
    }
}

#[derive(Default)]
struct EntityNode {
    /// Notes that mention this entity.
    sources: HashSet<String>,
    /// Undirected edges to other entities.
    edges: HashSet<String>,
}

#[derive(Default)]
struct GraphState {
    entities: HashMap<String, EntityNode>,
    note_entities: HashMap<String, HashSet<String>>,
}

/// In-memory [`GraphStore`]. The reference implementation, also used
/// throughout the test suites.
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prune_entity(state: &mut GraphState, entity: &str) {
    let Some(node) = state.entities.remove(entity) else {
        return;
    };
    for other in node.edges {
        if let Some(neighbor) = state.entities.get_mut(&other) {
            neighbor.edges.remove(entity);
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn merge_entities(
        &self,
        note_path: &str,
        entities: &[String],
        relations: &[(String, String)],
    ) -> Result<()> {
        let mut state = self.state.write().await;

        // Re-extraction replaces the note's previous attribution.
        let previous = state.note_entities.remove(note_path).unwrap_or_default();
        for entity in &previous {
            if entities.contains(entity) {
                continue;
            }
            let orphaned = state
                .entities
                .get_mut(entity)
                .map(|node| {
                    node.sources.remove(note_path);
                    node.sources.is_empty()
                })
                .unwrap_or(false);
            if orphaned {
                prune_entity(&mut state, entity);
            }
        }

        for entity in entities {
            state
                .entities
                .entry(entity.clone())
                .or_default()
                .sources
                .insert(note_path.to_string());
        }
        for (a, b) in relations {
            if a == b {
                continue;
            }
            state.entities.entry(a.clone()).or_default().edges.insert(b.clone());
            state.entities.entry(b.clone()).or_default().edges.insert(a.clone());
        }
        state
            .note_entities
            .insert(note_path.to_string(), entities.iter().cloned().collect());
        Ok(())
    }

    async fn remove_source(&self, note_path: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(entities) = state.note_entities.remove(note_path) else {
            return Ok(());
        };
        for entity in entities {
            let orphaned = state
                .entities
                .get_mut(&entity)
                .map(|node| {
                    node.sources.remove(note_path);
                    node.sources.is_empty()
                })
                .unwrap_or(false);
            if orphaned {
                prune_entity(&mut state, &entity);
            }
        }
        Ok(())
    }

    async fn neighbors(&self, entity: &str) -> Result<HashSet<String>> {
        let state = self.state.read().await;
        Ok(state
            .entities
            .get(entity)
            .map(|node| node.edges.clone())
            .unwrap_or_default())
    }

    async fn shortest_path_length(&self, a: &str, b: &str) -> Result<Option<usize>> {
        let state = self.state.read().await;
        if !state.entities.contains_key(a) || !state.entities.contains_key(b) {
            return Ok(None);
        }
        if a == b {
            return Ok(Some(0));
        }
        let mut visited: HashSet<&str> = HashSet::from([a]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(a, 0)]);
        while let Some((current, depth)) = queue.pop_front() {
            if let Some(node) = state.entities.get(current) {
                for next in &node.edges {
                    if next == b {
                        return Ok(Some(depth + 1));
                    }
                    if visited.insert(next) {
                        queue.push_back((next, depth + 1));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn entities_for_note(&self, note_path: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let mut entities: Vec<String> = state
            .note_entities
            .get(note_path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        entities.sort();
        Ok(entities)
    }

    async fn entity_count(&self) -> Result<usize> {
        Ok(self.state.read().await.entities.len())
    }
}
