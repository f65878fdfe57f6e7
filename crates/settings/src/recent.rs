use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 10;

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// 最近開啟的專案清單。 / Bounded, most-recent-first list of opened projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentProjects {
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    entries: VecDeque<PathBuf>,
}

impl Default for RecentProjects {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentProjects {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 調整容量並修剪超出的紀錄。 / Adjusts capacity and drops the oldest overflow.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.entries.truncate(self.capacity);
    }

    /// 加入或提升至清單頂端。 / Inserts or promotes a project to the front.
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.entries.retain(|existing| existing != &path);
        self.entries.push_front(path);
        self.entries.truncate(self.capacity);
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing.as_path() != path);
        before != self.entries.len()
    }

    /// Drops entries whose file no longer exists; returns how many were removed.
    /// 移除已不存在的專案檔。
    pub fn prune_missing(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|existing| existing.exists());
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Clamps the capacity after deserialization.
    pub(crate) fn sanitize(&mut self) {
        self.set_capacity(self.capacity);
    }
}
