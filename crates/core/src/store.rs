//! Fragment storage keyed by integer codes.
//! 以整數代碼索引的文字片段儲存區。
//!
//! The store has no knowledge of the outline tree. Codes are handed out by an
//! arena-style allocator: a high-water mark plus a free list of released
//! codes, so a code is never issued twice while it is live.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{OutlineEvent, SharedSink};

/// Opaque identifier of one fragment.
/// 文字片段的唯一代碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(u64);

impl Code {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised by [`ContentStore`].
/// [`ContentStore`] 可能回傳的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("macro `{name}` refers to code {code}, which is not live")]
    Reference { name: String, code: Code },
}

#[derive(Debug, Clone, Default)]
struct Fragment {
    text: String,
    saved: bool,
    pos: usize,
}

/// Mapping from codes to text with per-code dirty tracking and macro aliases.
/// 代碼至文字的對應表，附帶儲存狀態與巨集別名。
///
/// Not internally synchronized: every mutation goes through `&mut self` on the
/// control thread.
#[derive(Default)]
pub struct ContentStore {
    fragments: BTreeMap<Code, Fragment>,
    free: BTreeSet<Code>,
    next: u64,
    macros: BTreeMap<String, Code>,
    sink: Option<SharedSink>,
}

impl fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStore")
            .field("live", &self.fragments.len())
            .field("free", &self.free.len())
            .field("next", &self.next)
            .field("macros", &self.macros)
            .finish()
    }
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that reports dirty transitions to `sink`.
    /// 建立會把「變成未儲存」事件送往 `sink` 的儲存區。
    pub fn with_sink(sink: SharedSink) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    pub fn set_sink(&mut self, sink: Option<SharedSink>) {
        self.sink = sink;
    }

    /// Returns the fragment text, or `""` when the code is absent.
    /// 取得片段文字；代碼不存在時回傳空字串。
    pub fn get(&self, code: Code) -> &str {
        self.fragments
            .get(&code)
            .map(|fragment| fragment.text.as_str())
            .unwrap_or("")
    }

    /// Replaces the fragment text.
    ///
    /// A saved fragment stays saved only when `text` equals the previous text;
    /// an unsaved one stays unsaved until [`set_saved`](Self::set_saved) or
    /// [`save_all`](Self::save_all). An absent code becomes live and unsaved.
    /// Every transition to unsaved emits [`OutlineEvent::FragmentDirty`].
    pub fn set(&mut self, code: Code, text: impl Into<String>) {
        let text = text.into();
        let existed = self.fragments.contains_key(&code);
        self.claim(code);
        let fragment = self.fragments.entry(code).or_default();
        let was_saved = !existed || fragment.saved;
        fragment.saved = existed && fragment.saved && fragment.text == text;
        fragment.text = text;
        if was_saved && !fragment.saved {
            if let Some(sink) = &self.sink {
                sink.emit(&OutlineEvent::FragmentDirty { code });
            }
        }
    }

    /// Frees `code` and removes every macro alias pointing at it. No-op when absent.
    /// 釋放代碼並移除指向它的巨集；代碼不存在時不做任何事。
    pub fn delete(&mut self, code: Code) {
        if self.fragments.remove(&code).is_none() {
            return;
        }
        self.macros.retain(|_, bound| *bound != code);
        self.free.insert(code);
    }

    /// Reserves a code that is not live and returns it.
    ///
    /// The new fragment is empty and saved. Released codes are recycled
    /// lowest-first before the high-water mark grows.
    pub fn new_num(&mut self) -> Code {
        let code = loop {
            if let Some(code) = self.free.pop_first() {
                if !self.fragments.contains_key(&code) {
                    break code;
                }
                continue;
            }
            let candidate = Code(self.next);
            self.next += 1;
            if !self.fragments.contains_key(&candidate) {
                break candidate;
            }
        };
        self.fragments.insert(
            code,
            Fragment {
                saved: true,
                ..Fragment::default()
            },
        );
        code
    }

    /// Binds `name` to a live `code`, replacing any previous binding of `name`.
    /// 將巨集名稱綁定到存活的代碼。
    pub fn add_macro(&mut self, name: impl Into<String>, code: Code) -> Result<(), StoreError> {
        let name = name.into();
        if !self.contains(code) {
            return Err(StoreError::Reference { name, code });
        }
        self.macros.insert(name, code);
        Ok(())
    }

    /// Removes a macro alias, returning the code it was bound to.
    pub fn remove_macro(&mut self, name: &str) -> Option<Code> {
        self.macros.remove(name)
    }

    pub fn macro_code(&self, name: &str) -> Option<Code> {
        self.macros.get(name).copied()
    }

    /// Iterates `(name, code)` pairs in name order.
    /// 依名稱排序列舉巨集。
    pub fn macros(&self) -> impl Iterator<Item = (&str, Code)> + '_ {
        self.macros.iter().map(|(name, code)| (name.as_str(), *code))
    }

    /// Absent codes count as saved.
    pub fn is_saved(&self, code: Code) -> bool {
        self.fragments
            .get(&code)
            .map_or(true, |fragment| fragment.saved)
    }

    pub fn set_saved(&mut self, code: Code, saved: bool) {
        let Some(fragment) = self.fragments.get_mut(&code) else {
            return;
        };
        let was_saved = fragment.saved;
        fragment.saved = saved;
        if was_saved && !saved {
            if let Some(sink) = &self.sink {
                sink.emit(&OutlineEvent::FragmentDirty { code });
            }
        }
    }

    /// Marks every live code saved.
    pub fn save_all(&mut self) {
        for fragment in self.fragments.values_mut() {
            fragment.saved = true;
        }
    }

    pub fn set_pos(&mut self, code: Code, pos: usize) {
        if let Some(fragment) = self.fragments.get_mut(&code) {
            fragment.pos = pos;
        }
    }

    pub fn pos(&self, code: Code) -> usize {
        self.fragments.get(&code).map_or(0, |fragment| fragment.pos)
    }

    pub fn contains(&self, code: Code) -> bool {
        self.fragments.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Live codes in ascending order.
    pub fn codes(&self) -> impl Iterator<Item = Code> + '_ {
        self.fragments.keys().copied()
    }

    /// Drops every fragment and macro; the allocator restarts from zero.
    pub fn clear(&mut self) {
        self.fragments.clear();
        self.free.clear();
        self.macros.clear();
        self.next = 0;
    }

    /// Keeps the allocator consistent when a caller writes to an explicit code
    /// (e.g. one read back from a project container).
    fn claim(&mut self, code: Code) {
        if self.fragments.contains_key(&code) {
            return;
        }
        self.free.remove(&code);
        if code.0 >= self.next {
            self.next = code.0.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use std::sync::Arc;

    #[test]
    fn get_absent_code_is_empty() {
        let store = ContentStore::new();
        assert_eq!(store.get(Code::new(42)), "");
        assert!(store.is_saved(Code::new(42)));
        assert_eq!(store.pos(Code::new(42)), 0);
    }

    #[test]
    fn set_tracks_saved_flag_by_equality() {
        let mut store = ContentStore::new();
        let code = store.new_num();
        store.set(code, "hello");
        assert!(!store.is_saved(code));

        store.set_saved(code, true);
        store.set(code, "hello");
        assert!(store.is_saved(code));

        store.set(code, "hello!");
        assert!(!store.is_saved(code));

        // Typing the old text back does not undo the edit.
        store.set(code, "hello");
        assert!(!store.is_saved(code));
    }

    #[test]
    fn set_on_absent_code_makes_it_live_and_unsaved() {
        let mut store = ContentStore::new();
        store.set(Code::new(7), "");
        assert!(store.contains(Code::new(7)));
        assert!(!store.is_saved(Code::new(7)));
        let fresh = store.new_num();
        assert_ne!(fresh, Code::new(7));
    }

    #[test]
    fn new_num_never_collides_with_live_codes() {
        let mut store = ContentStore::new();
        store.set(Code::new(1), "taken");
        let a = store.new_num();
        let b = store.new_num();
        assert_ne!(a, b);
        assert_ne!(a, Code::new(1));
        assert_ne!(b, Code::new(1));

        store.delete(a);
        let c = store.new_num();
        assert_eq!(c, a, "released codes are recycled");
        assert_ne!(c, b);
    }

    #[test]
    fn delete_removes_macros_and_is_idempotent() {
        let mut store = ContentStore::new();
        let code = store.new_num();
        store.set(code, "print('hi')");
        store.add_macro("greet", code).unwrap();
        assert_eq!(store.macro_code("greet"), Some(code));

        store.delete(code);
        assert_eq!(store.get(code), "");
        assert_eq!(store.macros().count(), 0);
        store.delete(code);
    }

    #[test]
    fn add_macro_rejects_dead_codes() {
        let mut store = ContentStore::new();
        let err = store.add_macro("ghost", Code::new(99)).unwrap_err();
        assert_eq!(
            err,
            StoreError::Reference {
                name: "ghost".into(),
                code: Code::new(99)
            }
        );
    }

    #[test]
    fn save_all_is_idempotent() {
        let mut store = ContentStore::new();
        let a = store.new_num();
        let b = store.new_num();
        store.set(a, "x");
        store.set(b, "y");
        store.save_all();
        assert!(store.is_saved(a) && store.is_saved(b));
        store.save_all();
        assert!(store.is_saved(a) && store.is_saved(b));
    }

    #[test]
    fn dirty_transition_is_reported_once() {
        let log = Arc::new(EventLog::new());
        let mut store = ContentStore::with_sink(log.clone());
        let code = store.new_num();
        store.set(code, "one");
        store.set(code, "two");
        let events = log.drain();
        assert_eq!(events, vec![OutlineEvent::FragmentDirty { code }]);
    }

    #[test]
    fn macros_iterate_in_name_order() {
        let mut store = ContentStore::new();
        let a = store.new_num();
        let b = store.new_num();
        store.add_macro("zeta", a).unwrap();
        store.add_macro("alpha", b).unwrap();
        let names: Vec<_> = store.macros().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
