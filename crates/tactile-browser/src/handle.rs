//! Handles to remote objects living inside the browser.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::BrowserError;

/// Opaque reference to a live JS object or DOM node in one execution context.
///
/// Clones share the same disposed flag: disposing any clone invalidates all
/// of them. Once disposed, every operation fails with
/// [`BrowserError::HandleDisposed`].
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    object_id: String,
    backend_node_id: Option<i64>,
    context_id: Option<i64>,
    description: Option<String>,
    disposed: AtomicBool,
}

impl RemoteHandle {
    /// Wrap a CDP `Runtime.RemoteObjectId`.
    pub fn new(object_id: impl Into<String>) -> Self {
        Self::with_details(object_id, None, None, None)
    }

    pub fn with_details(
        object_id: impl Into<String>,
        backend_node_id: Option<i64>,
        context_id: Option<i64>,
        description: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                object_id: object_id.into(),
                backend_node_id,
                context_id,
                description,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn object_id(&self) -> &str {
        &self.inner.object_id
    }

    pub fn backend_node_id(&self) -> Option<i64> {
        self.inner.backend_node_id
    }

    pub fn context_id(&self) -> Option<i64> {
        self.inner.context_id
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Flip the disposed flag. Returns `true` only for the call that
    /// actually disposed the handle, so remote release happens once.
    pub fn mark_disposed(&self) -> bool {
        !self.inner.disposed.swap(true, Ordering::AcqRel)
    }

    pub fn ensure_alive(&self) -> Result<(), BrowserError> {
        if self.is_disposed() {
            return Err(BrowserError::HandleDisposed {
                handle: self.to_string(),
            });
        }
        Ok(())
    }

    /// Whether two handles refer to the same underlying handle state.
    pub fn same_handle(&self, other: &RemoteHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.description {
            Some(desc) => write!(f, "{desc} ({})", self.inner.object_id),
            None => f.write_str(&self.inner.object_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispose_is_idempotent() {
        let handle = RemoteHandle::new("obj-1");
        assert!(!handle.is_disposed());
        assert!(handle.mark_disposed());
        assert!(!handle.mark_disposed());
        assert!(handle.is_disposed());
    }

    #[test]
    fn clones_share_disposal() {
        let handle = RemoteHandle::new("obj-1");
        let clone = handle.clone();
        assert!(clone.same_handle(&handle));
        handle.mark_disposed();
        let err = clone.ensure_alive().unwrap_err();
        assert!(matches!(err, BrowserError::HandleDisposed { .. }));
    }

    #[test]
    fn display_prefers_description() {
        let plain = RemoteHandle::new("obj-7");
        assert_eq!(plain.to_string(), "obj-7");
        let described =
            RemoteHandle::with_details("obj-8", Some(12), Some(3), Some("button#go".into()));
        assert_eq!(described.to_string(), "button#go (obj-8)");
        assert_eq!(described.backend_node_id(), Some(12));
        assert_eq!(described.context_id(), Some(3));
    }

    #[test]
    fn concurrent_dispose_releases_once() {
        let handle = RemoteHandle::new("obj-1");
        let winners: usize = std::thread::scope(|s| {
            let joins: Vec<_> = (0..8)
                .map(|_| {
                    let h = handle.clone();
                    s.spawn(move || h.mark_disposed())
                })
                .collect();
            joins.into_iter().map(|j| j.join().unwrap() as usize).sum()
        });
        assert_eq!(winners, 1);
    }
}
