//! Pool of transient rendering contexts
//!
//! Worker threads that must touch the GPU layer outside the render thread
//! borrow a context, use it, and give it back. A borrowed context is removed
//! from the pool, so it cannot be lent twice.

use std::collections::HashSet;
use std::sync::Mutex;

use super::ResourceError;
use crate::foundation::ids::Identifier;
use crate::foundation::sync::lock;

/// A rendering context lent to one worker thread
///
/// Not `Clone`: there is exactly one value per live context and it must be
/// handed back to the pool that created it.
#[derive(Debug, PartialEq, Eq)]
pub struct TransientContext {
    id: Identifier,
}

impl TransientContext {
    /// Identifier of the context
    pub const fn id(&self) -> Identifier {
        self.id
    }
}

#[derive(Debug, Default)]
struct PoolState {
    available: Vec<TransientContext>,
    outstanding: HashSet<Identifier>,
    created: usize,
}

/// Bounded pool of [`TransientContext`]s
#[derive(Debug)]
pub struct ContextPool {
    max_contexts: usize,
    state: Mutex<PoolState>,
}

impl ContextPool {
    /// Create an empty pool that creates at most `max_contexts` contexts
    pub fn new(max_contexts: usize) -> Self {
        Self {
            max_contexts,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Take a context, creating one if the pool is empty and under its limit
    pub fn borrow(&self) -> Result<TransientContext, ResourceError> {
        let mut state = lock(&self.state);

        let context = match state.available.pop() {
            Some(context) => context,
            None if state.created < self.max_contexts => {
                state.created += 1;
                let context = TransientContext { id: Identifier::next() };
                log::debug!("Created transient context {}", context.id);
                context
            }
            None => {
                log::warn!("Transient context pool exhausted ({} in use)", state.outstanding.len());
                return Err(ResourceError::ContextPoolExhausted {
                    max: self.max_contexts,
                });
            }
        };

        state.outstanding.insert(context.id);
        Ok(context)
    }

    /// Return a context to the pool
    pub fn give_back(&self, context: TransientContext) -> Result<(), ResourceError> {
        let mut state = lock(&self.state);
        if !state.outstanding.remove(&context.id) {
            return Err(ResourceError::UnknownContext(context.id));
        }
        state.available.push(context);
        Ok(())
    }

    /// Contexts currently lent out
    pub fn outstanding(&self) -> usize {
        lock(&self.state).outstanding.len()
    }

    /// Contexts idle in the pool
    pub fn available(&self) -> usize {
        lock(&self.state).available.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_borrow_reuses_returned_context() {
        let pool = ContextPool::new(2);
        let ctx = pool.borrow().unwrap();
        let id = ctx.id();
        pool.give_back(ctx).unwrap();

        let again = pool.borrow().unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let pool = ContextPool::new(1);
        let _held = pool.borrow().unwrap();
        assert!(matches!(
            pool.borrow(),
            Err(ResourceError::ContextPoolExhausted { max: 1 })
        ));
    }

    #[test]
    fn test_foreign_context_rejected() {
        let a = ContextPool::new(1);
        let b = ContextPool::new(1);
        let ctx = a.borrow().unwrap();
        assert!(matches!(b.give_back(ctx), Err(ResourceError::UnknownContext(_))));
    }

    #[test]
    fn test_concurrent_borrowers_never_share() {
        let pool = ContextPool::new(4);
        let held: Vec<Identifier> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| pool.borrow().map(|ctx| ctx.id())))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        let unique: HashSet<_> = held.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(pool.outstanding(), 4);
    }
}
