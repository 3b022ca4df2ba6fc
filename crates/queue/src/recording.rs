//! `RecordingDispatcher`: a test double that keeps every request in memory.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{DispatchRequest, Dispatcher, QueueError};

#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    pub requests: Arc<Mutex<Vec<DispatchRequest>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests received so far, in dispatch order.
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}
