//! # Scoped Units of Work
//!
//! `Coordinator::scoped` runs a closure against the coordinator and then
//! always settles the log: Flush by default, Discard if the closure asked
//! for it with [`Scope::discard_on_exit`]. Settling happens on every exit
//! path of the closure, including an early `?` return. A panic in the
//! closure discards the log while unwinding; nothing reaches the backend.

use crate::StageError;
use crate::coordinator::Coordinator;
use crate::storage::StorageProvider;
use std::ops::{Deref, DerefMut};

/// Exclusive access to a coordinator for the duration of a unit of work.
pub struct Scope<'a, B: StorageProvider> {
    coordinator: &'a mut Coordinator<B>,
    discard: bool,
}

impl<B: StorageProvider> Scope<'_, B> {
    /// Roll back instead of committing when the scope ends.
    pub fn discard_on_exit(&mut self) {
        self.discard = true;
    }

    /// Whether the scope will discard when it ends.
    #[must_use]
    pub fn will_discard(&self) -> bool {
        self.discard
    }
}

impl<B: StorageProvider> Drop for Scope<'_, B> {
    fn drop(&mut self) {
        if std::thread::panicking() && !self.coordinator.is_synced() {
            let report = self.coordinator.discard();
            tracing::warn!(actions = report.actions, "scope panicked, staged actions discarded");
        }
    }
}

impl<B: StorageProvider> Deref for Scope<'_, B> {
    type Target = Coordinator<B>;

    fn deref(&self) -> &Self::Target {
        self.coordinator
    }
}

impl<B: StorageProvider> DerefMut for Scope<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.coordinator
    }
}

impl<B: StorageProvider> Coordinator<B> {
    /// Run `work` in a scope, then Flush (or Discard if requested).
    ///
    /// If the closure fails its error is returned; a Flush failure after a
    /// failed closure is only logged. If the closure succeeds, a Flush
    /// failure is returned instead of the closure's value.
    pub fn scoped<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Scope<'_, B>) -> Result<T, E>,
        E: From<StageError>,
    {
        let mut scope = Scope {
            coordinator: self,
            discard: false,
        };
        let outcome = work(&mut scope);
        let discard = scope.discard;
        drop(scope);

        if discard {
            let report = self.discard();
            tracing::debug!(actions = report.actions, "scope discarded");
            return outcome;
        }

        match (outcome, self.flush()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(flush_error)) => Err(E::from(flush_error)),
            (Err(error), Ok(_)) => Err(error),
            (Err(error), Err(flush_error)) => {
                tracing::warn!(error = %flush_error, "flush after failed scope also failed");
                Err(error)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{GraphName, Triple};

    fn g(name: &str) -> GraphName {
        GraphName::named(name)
    }

    fn t(s: &str) -> Triple {
        Triple::new(s, "ex:p", "ex:o")
    }

    #[test]
    fn scope_flushes_on_success() {
        let mut coordinator = Coordinator::new(MemoryStore::default());
        let value = coordinator
            .scoped(|scope| -> Result<u32, StageError> {
                scope.assert(&g("urn:g"), t("a"))?;
                Ok(7)
            })
            .expect("scope");

        assert_eq!(value, 7);
        assert!(coordinator.is_synced());
        assert!(coordinator.backend().graph(&g("urn:g")).is_some());
    }

    #[test]
    fn scope_flushes_even_when_work_fails() {
        let mut coordinator = Coordinator::new(MemoryStore::default());
        let result: Result<(), StageError> = coordinator.scoped(|scope| {
            scope.assert(&g("urn:g"), t("a"))?;
            scope.remove_graph(&g("urn:missing"))?;
            Ok(())
        });

        assert!(matches!(result, Err(StageError::GraphNotFound(_))));
        assert!(coordinator.is_synced());
        assert!(coordinator.backend().graph(&g("urn:g")).is_some());
    }

    #[test]
    fn discard_on_exit_rolls_back() {
        let mut coordinator = Coordinator::new(MemoryStore::default());
        coordinator
            .scoped(|scope| -> Result<(), StageError> {
                scope.assert(&g("urn:g"), t("a"))?;
                scope.discard_on_exit();
                assert!(scope.will_discard());
                Ok(())
            })
            .expect("scope");

        assert!(coordinator.is_synced());
        assert!(!coordinator.collection().contains(&g("urn:g")));
        assert!(coordinator.backend().journal().is_empty());
    }

    #[test]
    fn panic_in_work_discards_staged_actions() {
        use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

        let mut coordinator = Coordinator::new(MemoryStore::default());
        let unwound = catch_unwind(AssertUnwindSafe(|| {
            coordinator.scoped(|scope| -> Result<(), StageError> {
                scope.assert(&g("urn:g"), t("a"))?;
                resume_unwind(Box::new("work failed"))
            })
        }));

        assert!(unwound.is_err());
        assert!(coordinator.is_synced());
        assert!(!coordinator.collection().contains(&g("urn:g")));
        assert!(coordinator.backend().journal().is_empty());
    }

    #[test]
    fn flush_failure_is_returned_after_successful_work() {
        let mut coordinator = Coordinator::new(MemoryStore::default().fail_after(0));
        let result = coordinator.scoped(|scope| scope.assert(&g("urn:g"), t("a")));

        assert!(matches!(result, Err(StageError::BackendFailure(_))));
        assert!(coordinator.is_synced());
    }
}
