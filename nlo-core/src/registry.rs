//! Process-wide registration table for host callables.
//!
//! A callable attached to a handle must stay reachable for exactly as long
//! as some handle's binding refers to it, even while the only live reference
//! is held by the engine in the middle of a blocking solve. Rather than rely
//! on reference counting across the engine/host boundary, every binding
//! inserts an explicit entry here on attach (and again on duplication) and
//! removes it on release. The table holds a strong reference, so a host
//! garbage collector can never reclaim a registered callable.
//!
//! The table is plain shared state under a [`Mutex`]. The lock is scoped to
//! registration mutation only and is never held while a callback runs, so
//! synchronous re-entrant invocation cannot deadlock on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::binding::HostRef;

/// Identifier of an optimizer handle. Fresh per handle, including per
/// duplicate: a copy never shares its parent's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRATION: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_handle_id() -> HandleId {
    HandleId(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

struct Entry {
    owner: HandleId,
    // Strong reference: this is what keeps the callable reachable.
    #[allow(dead_code)]
    value: HostRef,
}

fn table() -> &'static Mutex<HashMap<u64, Entry>> {
    static TABLE: OnceLock<Mutex<HashMap<u64, Entry>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// RAII guard for one table entry.
///
/// Insertion happens on construction (attach or duplicate), removal on drop
/// (release). A `Registration` is deliberately not `Clone`: duplication of a
/// binding must create a *fresh* entry, never share one, because the two
/// owning handles have independent lifetimes.
#[derive(Debug)]
pub(crate) struct Registration {
    id: u64,
}

impl Registration {
    pub(crate) fn new(owner: HandleId, value: HostRef) -> Registration {
        let id = NEXT_REGISTRATION.fetch_add(1, Ordering::Relaxed);
        let mut entries = table().lock().expect("registry poisoned");
        entries.insert(id, Entry { owner, value });
        Registration { id }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut entries = table().lock().expect("registry poisoned");
        entries.remove(&self.id);
    }
}

/// Total number of live registrations, across all handles.
pub fn active_registrations() -> usize {
    table().lock().expect("registry poisoned").len()
}

/// Number of live registrations owned by one handle.
pub fn registrations_for(owner: HandleId) -> usize {
    table()
        .lock()
        .expect("registry poisoned")
        .values()
        .filter(|e| e.owner == owner)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{HostRef, ScalarEval};
    use std::sync::Arc;

    fn dummy() -> HostRef {
        let f = |_x: &[f64], _g: Option<&mut [f64]>| 0.0;
        HostRef::Scalar(Arc::new(f) as Arc<dyn ScalarEval>)
    }

    #[test]
    fn test_register_and_release() {
        let owner = next_handle_id();
        assert_eq!(registrations_for(owner), 0);
        let reg = Registration::new(owner, dummy());
        assert_eq!(registrations_for(owner), 1);
        drop(reg);
        assert_eq!(registrations_for(owner), 0);
    }

    #[test]
    fn test_entries_are_per_owner() {
        let a = next_handle_id();
        let b = next_handle_id();
        let _ra = Registration::new(a, dummy());
        let _rb1 = Registration::new(b, dummy());
        let _rb2 = Registration::new(b, dummy());
        assert_eq!(registrations_for(a), 1);
        assert_eq!(registrations_for(b), 2);
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let a = next_handle_id();
        let b = next_handle_id();
        assert_ne!(a, b);
    }
}
