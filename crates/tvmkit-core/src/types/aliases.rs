//! Type aliases for shared, thread-safe state.
//!
//! The driver shares a handful of values between the caller's thread and the
//! heartbeat thread. These aliases keep the lock flavour consistent across
//! crates.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Thread-safe, exclusively locked shared value.
pub type ThreadSafe<T> = Arc<Mutex<T>>;

/// Thread-safe, read-mostly shared value.
pub type ThreadSafeRw<T> = Arc<RwLock<T>>;

/// Create a new [`ThreadSafe`] value.
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}

/// Create a new [`ThreadSafeRw`] value.
pub fn thread_safe_rw<T>(value: T) -> ThreadSafeRw<T> {
    Arc::new(RwLock::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_across_clones() {
        let value = thread_safe(1u32);
        let other = value.clone();
        *other.lock() += 1;
        assert_eq!(*value.lock(), 2);

        let rw = thread_safe_rw(String::from("a"));
        rw.write().push('b');
        assert_eq!(rw.read().as_str(), "ab");
    }
}
