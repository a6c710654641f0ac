//! Interaction state store
//!
//! In-memory liked/bookmarked flags and per-request loading flags keyed by
//! `"<type>:<id>"`. The store is never authoritative: it is rehydrated from
//! the backend on every feed load and only mirrors what the viewer sees.
//!
//! Each setter merges into its own entry, so updates to different items never
//! clobber each other. Once the store's cancellation token fires, every
//! setter becomes a no-op; late responses cannot write into a store whose
//! owner has gone away.

use crate::content::{ContentRef, InteractionKind};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Viewer's interaction flags for one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionState {
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

impl InteractionState {
    pub fn get(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::Like => self.is_liked,
            InteractionKind::Bookmark => self.is_bookmarked,
        }
    }

    fn set(&mut self, kind: InteractionKind, value: bool) {
        match kind {
            InteractionKind::Like => self.is_liked = value,
            InteractionKind::Bookmark => self.is_bookmarked = value,
        }
    }
}

/// In-flight request flags for one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingState {
    pub is_like_loading: bool,
    pub is_bookmark_loading: bool,
}

impl LoadingState {
    pub fn get(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::Like => self.is_like_loading,
            InteractionKind::Bookmark => self.is_bookmark_loading,
        }
    }

    fn set(&mut self, kind: InteractionKind, value: bool) {
        match kind {
            InteractionKind::Like => self.is_like_loading = value,
            InteractionKind::Bookmark => self.is_bookmark_loading = value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    state: InteractionState,
    loading: LoadingState,
}

/// Store of interaction state for the items a session has seen
#[derive(Debug)]
pub struct InteractionStore {
    entries: DashMap<String, Entry>,
    cancel: CancellationToken,
}

impl Default for InteractionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Store bound to an existing session token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            entries: DashMap::new(),
            cancel,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop accepting writes
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Flags for an item, `{false, false}` if never seen
    pub fn get_state(&self, content: &ContentRef) -> InteractionState {
        self.entries
            .get(&content.key())
            .map(|e| e.state)
            .unwrap_or_default()
    }

    pub fn loading(&self, content: &ContentRef) -> LoadingState {
        self.entries
            .get(&content.key())
            .map(|e| e.loading)
            .unwrap_or_default()
    }

    pub fn is_loading(&self, content: &ContentRef, kind: InteractionKind) -> bool {
        self.loading(content).get(kind)
    }

    pub fn set_liked(&self, content: &ContentRef, value: bool) {
        self.set_active(content, InteractionKind::Like, value);
    }

    pub fn set_bookmarked(&self, content: &ContentRef, value: bool) {
        self.set_active(content, InteractionKind::Bookmark, value);
    }

    pub fn set_like_loading(&self, content: &ContentRef, value: bool) {
        self.set_loading(content, InteractionKind::Like, value);
    }

    pub fn set_bookmark_loading(&self, content: &ContentRef, value: bool) {
        self.set_loading(content, InteractionKind::Bookmark, value);
    }

    pub fn set_active(&self, content: &ContentRef, kind: InteractionKind, value: bool) {
        if self.is_cancelled() {
            trace!(key = %content, "store cancelled, dropping {} update", kind);
            return;
        }
        self.entries
            .entry(content.key())
            .or_default()
            .state
            .set(kind, value);
    }

    pub fn set_loading(&self, content: &ContentRef, kind: InteractionKind, value: bool) {
        if self.is_cancelled() {
            return;
        }
        self.entries
            .entry(content.key())
            .or_default()
            .loading
            .set(kind, value);
    }

    /// Atomically claim the loading flag for `kind`
    ///
    /// Returns `false` if a request for the same item and kind is already in
    /// flight, or the store is cancelled.
    pub fn try_begin(&self, content: &ContentRef, kind: InteractionKind) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let mut entry = self.entries.entry(content.key()).or_default();
        if entry.loading.get(kind) {
            return false;
        }
        entry.loading.set(kind, true);
        true
    }

    /// Claim the loading flag and release it when the guard drops
    pub fn begin(&self, content: &ContentRef, kind: InteractionKind) -> Option<LoadingGuard<'_>> {
        self.try_begin(content, kind).then(|| LoadingGuard {
            store: self,
            content: content.clone(),
            kind,
        })
    }

    /// Number of items with any recorded state
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every item's flags, keyed by `"<type>:<id>"`
    pub fn snapshot(&self) -> HashMap<String, InteractionState> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().state))
            .collect()
    }
}

/// Clears a loading flag on drop, whether the request succeeded or not
pub struct LoadingGuard<'a> {
    store: &'a InteractionStore,
    content: ContentRef,
    kind: InteractionKind,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(&self.content, self.kind, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentType;

    fn quote(id: &str) -> ContentRef {
        ContentRef::new(ContentType::Quote, id)
    }

    #[test]
    fn test_unseen_defaults_to_false() {
        let store = InteractionStore::new();
        assert_eq!(store.get_state(&quote("q1")), InteractionState::default());
        assert_eq!(store.loading(&quote("q1")), LoadingState::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_setters_merge_per_item() {
        let store = InteractionStore::new();
        store.set_liked(&quote("q1"), true);
        store.set_bookmarked(&quote("q1"), true);
        store.set_liked(&quote("q2"), true);
        store.set_liked(&quote("q2"), false);

        assert_eq!(
            store.get_state(&quote("q1")),
            InteractionState { is_liked: true, is_bookmarked: true }
        );
        assert_eq!(store.get_state(&quote("q2")), InteractionState::default());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_id_different_type_is_separate() {
        let store = InteractionStore::new();
        store.set_liked(&quote("x"), true);
        assert!(!store.get_state(&ContentRef::new(ContentType::Wiki, "x")).is_liked);
    }

    #[test]
    fn test_try_begin_is_exclusive_per_kind() {
        let store = InteractionStore::new();
        let r = quote("q1");

        assert!(store.try_begin(&r, InteractionKind::Like));
        assert!(!store.try_begin(&r, InteractionKind::Like));
        // Bookmark requests are independent of like requests
        assert!(store.try_begin(&r, InteractionKind::Bookmark));

        store.set_like_loading(&r, false);
        assert!(store.try_begin(&r, InteractionKind::Like));
    }

    #[test]
    fn test_guard_clears_flag_on_drop() {
        let store = InteractionStore::new();
        let r = quote("q1");
        {
            let _guard = store.begin(&r, InteractionKind::Bookmark).unwrap();
            assert!(store.is_loading(&r, InteractionKind::Bookmark));
            assert!(store.begin(&r, InteractionKind::Bookmark).is_none());
        }
        assert!(!store.is_loading(&r, InteractionKind::Bookmark));
    }

    #[test]
    fn test_cancelled_store_ignores_writes() {
        let store = InteractionStore::new();
        let r = quote("q1");
        store.set_liked(&r, true);
        store.cancel();

        store.set_liked(&r, false);
        store.set_bookmarked(&r, true);
        assert!(!store.try_begin(&r, InteractionKind::Like));
        assert_eq!(
            store.get_state(&r),
            InteractionState { is_liked: true, is_bookmarked: false }
        );
    }

    #[test]
    fn test_snapshot() {
        let store = InteractionStore::new();
        store.set_liked(&quote("q1"), true);
        let snap = store.snapshot();
        assert!(snap["quote:q1"].is_liked);
    }
}
