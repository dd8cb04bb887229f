//! Shared state handed to every handler

use crate::engine::TaskEngine;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<TaskEngine>,
}

impl AppState {
    pub fn new(engine: TaskEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
