//! Live repo -> commit count mapping and its ranking.

use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    counts: IndexMap<String, u64>,
}

/// One ranked row. `fraction` is the bar length relative to the leader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub resource_id: String,
    pub count: u64,
    pub fraction: f64,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest count for a resource. First sighting fixes its
    /// position among equal counts.
    pub fn update(&mut self, resource_id: &str, count: u64) {
        match self.counts.get_mut(resource_id) {
            Some(existing) => *existing = count,
            None => {
                self.counts.insert(resource_id.to_string(), count);
            }
        }
    }

    pub fn get(&self, resource_id: &str) -> Option<u64> {
        self.counts.get(resource_id).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn counts(&self) -> &IndexMap<String, u64> {
        &self.counts
    }

    /// Rows sorted by count, highest first. Ties keep insertion order.
    pub fn ranked(&self) -> Vec<LeaderboardRow> {
        let max = self.counts.values().copied().max().unwrap_or(0).max(1);
        let mut rows: Vec<(&String, u64)> = self.counts.iter().map(|(k, v)| (k, *v)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.into_iter()
            .enumerate()
            .map(|(i, (resource_id, count))| LeaderboardRow {
                rank: i + 1,
                resource_id: resource_id.clone(),
                count,
                fraction: count as f64 / max as f64,
            })
            .collect()
    }
}
