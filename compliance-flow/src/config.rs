use std::time::Duration;

/// Tunables shared by the map and reduce stages.
///
/// Constructed once by the caller and passed into the pipeline; nothing in
/// this crate reads the environment.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Documents summarized concurrently per batch
    pub batch_size: usize,
    /// Pause between two consecutive batches
    pub batch_delay: Duration,
    /// Per-document character budget before summarization
    pub document_char_budget: usize,
    /// Budget for any single block of text embedded in a synthesis prompt
    pub prompt_char_budget: usize,
    /// Budget for the report context embedded in the chat system instruction
    pub chat_context_char_budget: usize,
    /// Replace each document with its salient sections before summarizing
    pub extract_key_sections: bool,
    pub summary_max_tokens: u64,
    pub synthesis_max_tokens: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(500),
            document_char_budget: 10_000,
            prompt_char_budget: 28_000,
            chat_context_char_budget: 4_000,
            extract_key_sections: false,
            summary_max_tokens: 800,
            synthesis_max_tokens: 4_000,
        }
    }
}

impl FlowConfig {
    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size;
        self.batch_delay = batch_delay;
        self
    }
}
