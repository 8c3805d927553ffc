use std::collections::HashMap;
use std::sync::Arc;

use hundred_core::model::{ChallengeState, UserId};
use parking_lot::{Mutex, RwLock};

type Entry = Arc<Mutex<ChallengeState>>;

/// Authoritative in-memory map of user to challenge state.
///
/// Locking: the outer `RwLock` guards map membership, each entry has its own
/// `Mutex`. Per-user read-modify-write holds the outer *read* lock plus that
/// user's mutex, so different users never block each other. Anything that
/// changes membership or needs a consistent view of every user (`put`,
/// `delete`, `snapshot`, `replace_all`) takes the outer *write* lock, which
/// also waits out in-flight per-user updates.
///
/// No method awaits or performs I/O while a lock is held.
#[derive(Default)]
pub struct SessionStore {
    entries: RwLock<HashMap<UserId, Entry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state for `user_id`, if any.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<ChallengeState> {
        let entries = self.entries.read();
        entries.get(&user_id).map(|entry| *entry.lock())
    }

    /// Insert or wholesale replace the state for `user_id`.
    pub fn put(&self, user_id: UserId, state: ChallengeState) {
        let previous = self
            .entries
            .write()
            .insert(user_id, Arc::new(Mutex::new(state)));
        drop(previous);
    }

    /// Remove the state for `user_id`, returning it if present.
    pub fn delete(&self, user_id: UserId) -> Option<ChallengeState> {
        let removed = self.entries.write().remove(&user_id);
        removed.map(|entry| *entry.lock())
    }

    /// Run `f` against the user's state inside that user's critical section.
    ///
    /// Returns `None` without calling `f` when the user has no state.
    pub fn update<R>(&self, user_id: UserId, f: impl FnOnce(&mut ChallengeState) -> R) -> Option<R> {
        let entries = self.entries.read();
        let entry = entries.get(&user_id)?;
        let mut state = entry.lock();
        Some(f(&mut state))
    }

    /// Point-in-time copy of every entry, ordered by user id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(UserId, ChallengeState)> {
        let mut copy: Vec<_> = {
            let entries = self.entries.write();
            entries
                .iter()
                .map(|(user_id, entry)| (*user_id, *entry.lock()))
                .collect()
        };
        copy.sort_by_key(|(user_id, _)| *user_id);
        copy
    }

    /// Swap in a completely new set of entries.
    ///
    /// The replacement map is built before the lock is taken, so readers see
    /// either the old contents or the new ones, never a mix. Later duplicates
    /// of a user id win. Returns the number of users now held.
    pub fn replace_all(&self, states: impl IntoIterator<Item = (UserId, ChallengeState)>) -> usize {
        let fresh: HashMap<UserId, Entry> = states
            .into_iter()
            .map(|(user_id, state)| (user_id, Arc::new(Mutex::new(state))))
            .collect();
        let count = fresh.len();

        let previous = std::mem::replace(&mut *self.entries.write(), fresh);
        drop(previous);
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("users", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hundred_core::model::GameMode;
    use std::thread;

    fn fresh() -> ChallengeState {
        ChallengeState::new(GameMode::HundredAttempt)
    }

    #[test]
    fn put_get_delete() {
        let store = SessionStore::new();
        let user = UserId::new(1);
        assert!(store.get(user).is_none());

        store.put(user, fresh());
        assert_eq!(store.get(user), Some(fresh()));

        assert_eq!(store.delete(user), Some(fresh()));
        assert!(store.get(user).is_none());
        assert!(store.delete(user).is_none());
    }

    #[test]
    fn put_replaces_instead_of_merging() {
        let store = SessionStore::new();
        let user = UserId::new(1);
        store.put(user, fresh());
        store.update(user, |s| s.apply_result(false));

        store.put(user, fresh());
        assert_eq!(store.get(user).map(|s| s.courses_attempted()), Some(0));
    }

    #[test]
    fn update_on_missing_user_does_nothing() {
        let store = SessionStore::new();
        let mut called = false;
        let result = store.update(UserId::new(5), |_| called = true);
        assert!(result.is_none());
        assert!(!called);
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_sorted_copy() {
        let store = SessionStore::new();
        store.put(UserId::new(3), fresh());
        store.put(UserId::new(1), fresh());
        store.put(UserId::new(2), fresh());

        let snapshot = store.snapshot();
        let ids: Vec<_> = snapshot.iter().map(|(id, _)| id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        store.update(UserId::new(1), |s| s.apply_result(false));
        assert_eq!(snapshot[0].1.courses_attempted(), 0);
    }

    #[test]
    fn replace_all_drops_previous_entries() {
        let store = SessionStore::new();
        store.put(UserId::new(1), fresh());
        store.put(UserId::new(2), fresh());

        let count = store.replace_all(vec![(UserId::new(9), fresh())]);
        assert_eq!(count, 1);
        assert!(store.get(UserId::new(1)).is_none());
        assert!(store.get(UserId::new(9)).is_some());
    }

    #[test]
    fn concurrent_updates_for_one_user_are_not_lost() {
        let store = Arc::new(SessionStore::new());
        let user = UserId::new(1);
        store.put(user, fresh());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..250 {
                        store.update(user, |s| s.apply_result(true));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.get(user).unwrap();
        assert_eq!(state.courses_attempted(), 2_000);
        assert_eq!(state.courses_cleared(), 2_000);
    }

    #[test]
    fn readers_never_see_a_partial_replacement() {
        let store = Arc::new(SessionStore::new());
        let batch = |offset: u32| -> Vec<(UserId, ChallengeState)> {
            (0..200).map(|i| (UserId::new(offset + i), fresh())).collect()
        };
        store.replace_all(batch(0));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 1..50 {
                    store.replace_all(batch(round * 1_000));
                }
            })
        };

        for _ in 0..200 {
            let len = store.snapshot().len();
            assert_eq!(len, 200);
        }
        writer.join().unwrap();
    }
}
