//! # Reply registry.
//!
//! Ordered, subject-keyed store of [`ReplyRegistration`]s.
//!
//! ## Rules
//! - At most one registration per subject; re-registering is an error, never an update.
//! - Insertion order is kept; [`Registry::list`] returns an immutable [`Snapshot`].
//! - Every successful change bumps a generation counter published on a
//!   `watch` channel. A running listener treats the bump as a request to
//!   resubscribe; nobody listening means the bump is simply recorded.
//! - Entries are only removed all at once, by [`Registry::clear`].

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use super::handler::HandlerRef;
use crate::error::RegistryError;

/// One registered reply handler with its resolved queue group.
pub struct ReplyRegistration {
    subject: String,
    queue: Option<String>,
    handler: HandlerRef,
}

impl ReplyRegistration {
    pub(crate) fn new(subject: String, queue: Option<String>, handler: HandlerRef) -> Self {
        Self {
            subject,
            queue,
            handler,
        }
    }

    /// Subject pattern (may contain wildcards).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Resolved queue group.
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Handler invoked for matching messages.
    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }
}

impl fmt::Debug for ReplyRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyRegistration")
            .field("subject", &self.subject)
            .field("queue", &self.queue)
            .field("handler", &self.handler.describe())
            .finish()
    }
}

/// Point-in-time view of the registry, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    entries: Arc<Vec<Arc<ReplyRegistration>>>,
}

impl Snapshot {
    /// Iterates registrations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ReplyRegistration>> {
        self.entries.iter()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the snapshot holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subjects in insertion order.
    pub fn subjects(&self) -> Vec<&str> {
        self.entries.iter().map(|r| r.subject()).collect()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Arc<ReplyRegistration>;
    type IntoIter = std::slice::Iter<'a, Arc<ReplyRegistration>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Default)]
struct Entries {
    ordered: Arc<Vec<Arc<ReplyRegistration>>>,
    subjects: HashSet<String>,
}

/// Subject-keyed registry of reply handlers.
pub struct Registry {
    entries: RwLock<Entries>,
    generation: watch::Sender<u64>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            entries: RwLock::new(Entries::default()),
            generation,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a fully resolved registration.
    ///
    /// Fails with [`RegistryError::InvalidSubject`] for an empty subject and
    /// [`RegistryError::DuplicateSubject`] if the subject is taken; the
    /// registry is unchanged on error.
    pub(crate) fn insert(
        &self,
        registration: ReplyRegistration,
    ) -> Result<Arc<ReplyRegistration>, RegistryError> {
        if registration.subject.is_empty() {
            return Err(RegistryError::InvalidSubject);
        }
        let registration = Arc::new(registration);
        {
            let mut entries = self.write();
            if entries.subjects.contains(registration.subject()) {
                return Err(RegistryError::DuplicateSubject {
                    subject: registration.subject.clone(),
                });
            }
            entries.subjects.insert(registration.subject.clone());
            Arc::make_mut(&mut entries.ordered).push(Arc::clone(&registration));
        }
        self.generation.send_modify(|g| *g += 1);
        Ok(registration)
    }

    /// Removes every registration and signals the change.
    pub fn clear(&self) {
        {
            let mut entries = self.write();
            *entries = Entries::default();
        }
        self.generation.send_modify(|g| *g += 1);
    }

    /// Current registrations, unaffected by later changes.
    pub fn list(&self) -> Snapshot {
        Snapshot {
            entries: Arc::clone(&self.read().ordered),
        }
    }

    /// Registration for exactly `subject`, if any.
    pub fn get(&self, subject: &str) -> Option<Arc<ReplyRegistration>> {
        self.read()
            .ordered
            .iter()
            .find(|r| r.subject() == subject)
            .cloned()
    }

    /// True if `subject` is registered.
    pub fn contains(&self, subject: &str) -> bool {
        self.read().subjects.contains(subject)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.read().ordered.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().ordered.is_empty()
    }

    /// Current change generation.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver notified on every successful change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}
