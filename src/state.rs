use std::sync::Arc;
use std::time::Duration;

use crate::llm::CompletionBackend;
use crate::models::SupportedModel;
use crate::store::PageStore;

// app's shared state, built once in main and handed to every request
pub struct AppState {
    pub backend: Arc<dyn CompletionBackend>,
    pub store: Arc<dyn PageStore>,
    pub default_model: SupportedModel,
    pub max_duration: Duration,     // hard ceiling on one request
    pub smoothing_delay: Duration,  // pause between streamed words
}
