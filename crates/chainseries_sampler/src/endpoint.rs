//! Round-robin selection over a pool of read endpoints

use chainseries_core::ReadApi;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Pool of read endpoints handed out round-robin, one per task
pub struct EndpointPool {
    endpoints: Vec<Arc<dyn ReadApi>>,
    next: AtomicUsize,
}

impl EndpointPool {
    /// `None` for an empty pool
    pub fn new(endpoints: Vec<Arc<dyn ReadApi>>) -> Option<Self> {
        if endpoints.is_empty() {
            return None;
        }
        Some(Self {
            endpoints,
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Next endpoint in rotation
    pub fn next(&self) -> Arc<dyn ReadApi> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.endpoints[index].clone()
    }
}
