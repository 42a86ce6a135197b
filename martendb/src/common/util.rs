use parking_lot::RwLock;
use std::sync::Arc;

/// Shared mutable cell used across the crate for interior mutability.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value in an [Atomic] cell.
#[inline]
pub fn atomic<T>(t: T) -> Atomic<T> {
    Arc::new(RwLock::new(t))
}
