use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use jobkit::task::TaskHandler;

/// Shared record of which task bodies actually ran, in start order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    started: Arc<Mutex<Vec<String>>>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn ran(&self, id: &str) -> bool {
        self.entries().iter().any(|e| e == id)
    }

    pub fn push(&self, id: &str) {
        self.started.lock().unwrap().push(id.to_string());
    }

    /// Body that records `id` and succeeds.
    pub fn succeed(&self, id: &str) -> TaskHandler {
        let log = self.clone();
        let id = id.to_string();
        TaskHandler::no_args(move || {
            log.push(&id);
            async { Ok(()) }
        })
    }

    /// Body that records `id` and fails with `message`.
    pub fn fail(&self, id: &str, message: &str) -> TaskHandler {
        let log = self.clone();
        let id = id.to_string();
        let message = message.to_string();
        TaskHandler::no_args(move || {
            log.push(&id);
            let message = message.clone();
            async move { Err::<(), _>(anyhow!(message)) }
        })
    }
}
