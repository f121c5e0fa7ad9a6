//! Startup wiring: one shared HTTP client, the Twitch side, the Telegram side,
//! and the two long-running tasks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::GreetingResponder;
use crate::config::AppConfig;
use crate::credentials::{CredentialManager, TwitchCredentialManager};
use crate::monitor::HelixClient;
use crate::notification::{NotificationDispatcher, TelegramChannel};
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::utils::http_client::build_http_client;

/// Fully wired application, ready to run.
pub struct App {
    credentials: Arc<TwitchCredentialManager>,
    scheduler: Scheduler,
    greeter: GreetingResponder,
}

impl App {
    /// Wire every component from `config`. Makes no network calls.
    pub fn build(config: &AppConfig) -> crate::Result<Self> {
        let client = build_http_client(config.request_timeout)?;

        let credentials = Arc::new(TwitchCredentialManager::new(
            client.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        ));
        let source = Arc::new(HelixClient::new(
            client.clone(),
            config.client_id.clone(),
            credentials.clone(),
        ));

        let telegram = Arc::new(TelegramChannel::new(config.telegram.clone(), client));
        let dispatcher =
            NotificationDispatcher::new(telegram.clone(), config.telegram.chat_id.clone());

        let scheduler = Scheduler::new(
            config.channels.clone(),
            credentials.clone(),
            source,
            dispatcher,
            SchedulerConfig {
                interval: config.poll_interval,
            },
        );

        Ok(Self {
            credentials,
            scheduler,
            greeter: GreetingResponder::new(telegram),
        })
    }

    /// Acquire the first token, then run the poller and the greeter until
    /// `cancel` fires. Returns once both tasks have stopped.
    pub async fn run(self, cancel: CancellationToken) {
        if let Err(e) = self.credentials.acquire().await {
            warn!(error = %e, "Initial token acquisition failed, retrying on the first poll");
        }

        let scheduler_task = tokio::spawn(self.scheduler.run(cancel.child_token()));
        let greeter_task = tokio::spawn(self.greeter.run(cancel.child_token()));

        let (scheduler_result, greeter_result) = tokio::join!(scheduler_task, greeter_task);
        if let Err(e) = scheduler_result {
            error!(error = %e, "Scheduler task failed");
        }
        if let Err(e) = greeter_result {
            error!(error = %e, "Greeting task failed");
        }
        info!("All tasks stopped");
    }
}
