//! Lock helpers shared by the bookkeeping types

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a listener panicked while it was held
///
/// Critical sections in this crate never leave state half-updated across a
/// panic point, so the inner value is still consistent after poisoning.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
