//! Small synchronization helpers shared across the crate.

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// The crate's mutexes only guard plain data (listener lists, name strings,
/// context slots), so a poisoned lock still holds a usable value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
