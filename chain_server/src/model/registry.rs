//! Subscription correlation registry.
//!
//! Maps the opaque id of every issued subscription to the model location its push
//! messages update: the underlying quote, or one feed of one option leg.
//!
//! Design notes:
//! - An id maps to exactly one target. Registering an id that is already bound to a
//!   different target is rejected and the first binding stays in force, so a reused id
//!   can never route a later message to the wrong leg. Re-registering the same binding
//!   is a no-op.
//! - Resolving an unknown id is not an error; the caller drops such messages.
//! - The registry is not synchronized; it lives inside the model behind the model lock,
//!   which keeps it consistent with the leg set.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chain_common::ChainError;
use chain_common::protocol::{FeedKind, SubscriptionId};

use crate::model::chain::LegKey;

/// Model location fed by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Quotes of the underlying.
    Underlying,
    /// One feed of one option leg.
    Leg {
        /// Strike and kind of the leg.
        key: LegKey,
        /// Which of the leg's feeds.
        feed: FeedKind,
    },
}

/// Lookup from subscription id to target.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    targets: HashMap<SubscriptionId, Target>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `id` to `target`.
    pub fn register(&mut self, id: SubscriptionId, target: Target) -> Result<(), ChainError> {
        match self.targets.entry(id) {
            Entry::Occupied(entry) if *entry.get() == target => Ok(()),
            Entry::Occupied(entry) => Err(ChainError::DuplicateSubscription(entry.key().to_string())),
            Entry::Vacant(entry) => {
                entry.insert(target);
                Ok(())
            }
        }
    }

    /// Target bound to `id`, if any.
    pub fn resolve(&self, id: &SubscriptionId) -> Option<Target> {
        self.targets.get(id).copied()
    }

    /// Removes the binding of `id`; later messages on it resolve to nothing.
    pub fn retire(&mut self, id: &SubscriptionId) -> Option<Target> {
        self.targets.remove(id)
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
