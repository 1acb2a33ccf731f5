use std::collections::HashMap;
use std::hash::Hash;

use tracing::warn;

use super::Identity;
use crate::ChangeEvent;
use crate::ChangeKind;

/// Folds change events into an identity-keyed, ordered list.
///
/// - ADDED and MODIFIED replace the entry in place when its identity is
///   present, otherwise append it
/// - DELETED removes the matching entry; deleting an absent identity is a
///   no-op
///
/// The list never holds two entries with the same identity as long as it
/// only ever grows through [`Reconciler::apply`] and [`Reconciler::dedupe`].
pub struct Reconciler<T, K> {
    identity: Identity<T, K>,
}

impl<T, K> Clone for Reconciler<T, K> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
        }
    }
}

impl<T, K> Reconciler<T, K>
where
    K: Eq + Hash + std::fmt::Debug,
{
    pub fn new(identity: Identity<T, K>) -> Self {
        Self { identity }
    }

    pub fn identity_of(
        &self,
        item: &T,
    ) -> K {
        (self.identity)(item)
    }

    /// Applies one event. Returns whether `items` changed.
    pub fn apply(
        &self,
        items: &mut Vec<T>,
        event: ChangeEvent<T>,
    ) -> bool {
        let key = self.identity_of(&event.payload);
        let position = items.iter().position(|item| self.identity_of(item) == key);

        match (event.kind, position) {
            (ChangeKind::Deleted, Some(index)) => {
                items.remove(index);
                true
            }
            (ChangeKind::Deleted, None) => false,
            (ChangeKind::Added | ChangeKind::Modified, Some(index)) => {
                items[index] = event.payload;
                true
            }
            (ChangeKind::Added | ChangeKind::Modified, None) => {
                items.push(event.payload);
                true
            }
        }
    }

    /// Collapses duplicate identities in a baseline.
    ///
    /// The later entry's value wins and takes the position of the first
    /// occurrence. Each collision is logged.
    pub fn dedupe(
        &self,
        baseline: Vec<T>,
    ) -> Vec<T> {
        let mut positions: HashMap<K, usize> = HashMap::with_capacity(baseline.len());
        let mut items: Vec<T> = Vec::with_capacity(baseline.len());

        for item in baseline {
            let key = self.identity_of(&item);
            match positions.get(&key) {
                Some(&index) => {
                    warn!(identity = ?key, "Identity collision in baseline, keeping the later entry");
                    items[index] = item;
                }
                None => {
                    positions.insert(key, items.len());
                    items.push(item);
                }
            }
        }

        items
    }
}
