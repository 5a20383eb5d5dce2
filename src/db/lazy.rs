//! Lazily established, process-wide connection handle
//!
//! The first caller opens the connection; concurrent callers wait on that
//! attempt instead of opening their own. A failed attempt leaves the slot
//! empty so the next caller tries again. There is no internal retry loop.

use std::future::Future;
use tokio::sync::OnceCell;

/// Single-flight cache for one connection handle
#[derive(Debug)]
pub struct LazyConnection<T> {
    cell: OnceCell<T>,
}

impl<T> LazyConnection<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the cached handle, connecting first if needed.
    pub async fn get_or_connect<F, Fut, E>(&self, connect: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_try_init(connect).await
    }

    /// Cached handle without connecting
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}

impl<T> Default for LazyConnection<T> {
    fn default() -> Self {
        Self::new()
    }
}
