use std::sync::Arc;

use crate::clock::Clock;
use crate::config::FeedbackConfig;
use crate::notifier::TelegramClient;
use crate::store::SubmissionStore;

// app's shared state

pub struct AppState {
    pub config: FeedbackConfig,
    pub store: Arc<dyn SubmissionStore>, // per-IP counters
    pub notifier: TelegramClient,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: FeedbackConfig,
        store: Arc<dyn SubmissionStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let notifier = TelegramClient::new(&config.telegram);

        Arc::new(Self {
            config,
            store,
            notifier,
            clock,
        })
    }
}
