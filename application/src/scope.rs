//! Site scope context.
//!
//! [`SiteScopeContext`] holds the single active tenant and is the only place
//! it can change. Components that depend on the tenant register as
//! [`ScopeListener`]s and are told about every change so they can hard-reset.

use sitechat_domain::{DomainError, SiteScope};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::info;

/// A scope transition delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChange {
    /// The new scope, `None` after a clear.
    pub scope: Option<SiteScope>,
    /// Generation number after the change. Strictly increasing.
    pub generation: u64,
}

/// Observer of scope changes.
///
/// Called synchronously from [`SiteScopeContext::select`] and
/// [`SiteScopeContext::clear`], without the context's lock held.
pub trait ScopeListener: Send + Sync {
    fn on_scope_changed(&self, change: &ScopeChange);
}

struct ScopeInner {
    current: Option<SiteScope>,
    generation: u64,
    listeners: Vec<Weak<dyn ScopeListener>>,
}

/// Single-writer holder of the active tenant.
pub struct SiteScopeContext {
    inner: Mutex<ScopeInner>,
}

impl SiteScopeContext {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ScopeInner {
                current: None,
                generation: 0,
                listeners: Vec::new(),
            }),
        }
    }

    /// Create a context with an initial scope, before any listener exists.
    pub fn with_scope(scope: SiteScope) -> Result<Self, DomainError> {
        scope.validate()?;
        let context = Self::new();
        {
            let mut inner = context.lock();
            inner.current = Some(scope);
            inner.generation = 1;
        }
        Ok(context)
    }

    /// Register a listener. Dropped listeners are pruned on the next change.
    pub fn register(&self, listener: Weak<dyn ScopeListener>) {
        self.lock().listeners.push(listener);
    }

    /// The active scope, if any.
    pub fn current(&self) -> Option<SiteScope> {
        self.lock().current.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Active scope and generation read atomically.
    pub fn snapshot(&self) -> (Option<SiteScope>, u64) {
        let inner = self.lock();
        (inner.current.clone(), inner.generation)
    }

    /// Make `scope` the active tenant.
    ///
    /// Returns `Ok(false)` without notifying anyone if it is already active.
    pub fn select(&self, scope: SiteScope) -> Result<bool, DomainError> {
        scope.validate()?;
        if self.lock().current.as_ref() == Some(&scope) {
            return Ok(false);
        }
        info!("Selecting site scope {}", scope);
        self.change(Some(scope));
        Ok(true)
    }

    /// Drop the active tenant (explicit clear or logout).
    ///
    /// Returns false if no scope was active.
    pub fn clear(&self) -> bool {
        if self.lock().current.is_none() {
            return false;
        }
        info!("Clearing site scope");
        self.change(None);
        true
    }

    fn change(&self, scope: Option<SiteScope>) {
        let (change, listeners) = {
            let mut inner = self.lock();
            inner.current = scope;
            inner.generation += 1;
            inner.listeners.retain(|l| l.strong_count() > 0);
            let listeners: Vec<Arc<dyn ScopeListener>> =
                inner.listeners.iter().filter_map(Weak::upgrade).collect();
            (
                ScopeChange {
                    scope: inner.current.clone(),
                    generation: inner.generation,
                },
                listeners,
            )
        };

        for listener in listeners {
            listener.on_scope_changed(&change);
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SiteScopeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<ScopeChange>>,
    }

    impl ScopeListener for Recorder {
        fn on_scope_changed(&self, change: &ScopeChange) {
            self.changes.lock().unwrap().push(change.clone());
        }
    }

    fn scope(id: &str) -> SiteScope {
        SiteScope::new(id, "token", "Site")
    }

    #[test]
    fn select_notifies_listeners_with_new_generation() {
        let context = SiteScopeContext::new();
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn ScopeListener> = Arc::downgrade(&recorder) as Weak<dyn ScopeListener>;
        context.register(weak);

        assert!(context.select(scope("s1")).unwrap());
        assert!(context.clear());

        let changes = recorder.changes.lock().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].scope, Some(scope("s1")));
        assert_eq!(changes[0].generation, 1);
        assert_eq!(changes[1].scope, None);
        assert_eq!(changes[1].generation, 2);
    }

    #[test]
    fn invalid_scope_is_rejected_without_change() {
        let context = SiteScopeContext::new();
        let result = context.select(SiteScope::new("s1", "", "Site"));
        assert!(matches!(result, Err(DomainError::InvalidScope(_))));
        assert_eq!(context.generation(), 0);
        assert!(context.current().is_none());
    }

    #[test]
    fn reselecting_same_scope_is_a_no_op() {
        let context = SiteScopeContext::with_scope(scope("s1")).unwrap();
        assert!(!context.select(scope("s1")).unwrap());
        assert_eq!(context.generation(), 1);
        assert!(context.select(scope("s2")).unwrap());
        assert_eq!(context.generation(), 2);
    }

    #[test]
    fn clear_without_scope_is_a_no_op() {
        let context = SiteScopeContext::new();
        assert!(!context.clear());
        assert_eq!(context.generation(), 0);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let context = SiteScopeContext::new();
        {
            let recorder = Arc::new(Recorder::default());
            let weak: Weak<dyn ScopeListener> = Arc::downgrade(&recorder) as Weak<dyn ScopeListener>;
            context.register(weak);
        }
        context.select(scope("s1")).unwrap();
        assert!(context.lock().listeners.is_empty());
    }
}
