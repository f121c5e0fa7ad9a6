//! Poll loop driving credential refresh, status fetch, diff and notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::credentials::CredentialManager;
use crate::monitor::{ChannelName, LiveSession, LiveStatusSource, StreamStatusTracker};
use crate::notification::NotificationDispatcher;

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed delay between the end of one cycle and the start of the next.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A cycle is in progress.
    Polling,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot fetched and diffed; notifications attempted.
    Completed {
        went_live: usize,
        went_offline: usize,
        delivery_failures: usize,
    },
    /// No credential could be acquired; nothing was fetched.
    AuthFailed,
    /// The upstream kept rejecting the credential after one refresh.
    Unauthorized,
    /// The fetch failed for any other reason.
    Transient,
}

/// Sequential poller.
///
/// Owns the live set; the credential holder, status source and dispatcher are
/// injected.
pub struct Scheduler {
    channels: Vec<ChannelName>,
    credentials: Arc<dyn CredentialManager>,
    source: Arc<dyn LiveStatusSource>,
    dispatcher: NotificationDispatcher,
    tracker: StreamStatusTracker,
    config: SchedulerConfig,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(
        channels: Vec<ChannelName>,
        credentials: Arc<dyn CredentialManager>,
        source: Arc<dyn LiveStatusSource>,
        dispatcher: NotificationDispatcher,
        config: SchedulerConfig,
    ) -> Self {
        let tracker = StreamStatusTracker::new(channels.iter().cloned());
        Self {
            channels,
            credentials,
            source,
            dispatcher,
            tracker,
            config,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tracker(&self) -> &StreamStatusTracker {
        &self.tracker
    }

    /// Run cycles until `cancel` fires.
    ///
    /// The first cycle starts immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            channels = self.channels.len(),
            interval_secs = self.config.interval.as_secs(),
            platform = self.source.platform_id(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.run_cycle() => {
                    debug!(?outcome, "Poll cycle finished");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        self.state = SchedulerState::Idle;
        info!("Scheduler stopped");
    }

    /// Execute one poll cycle. Errors never escape; they are logged and folded
    /// into the outcome.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.state = SchedulerState::Polling;
        let outcome = self.poll().await;
        self.state = SchedulerState::Idle;
        outcome
    }

    async fn poll(&mut self) -> CycleOutcome {
        if !self.credentials.is_valid() && !self.acquire_credential().await {
            return CycleOutcome::AuthFailed;
        }

        let snapshot = match self.fetch_with_refresh().await {
            Ok(snapshot) => snapshot,
            Err(outcome) => return outcome,
        };

        let diff = self.tracker.diff(snapshot);
        if diff.is_empty() {
            debug!(live = self.tracker.live_count(), "No live status changes");
        }

        let mut delivery_failures = 0;
        for session in &diff.went_live {
            if let Err(e) = self.dispatcher.notify(session).await {
                delivery_failures += 1;
                warn!(
                    channel = %session.channel,
                    rate_limited = e.is_rate_limited(),
                    error = %e,
                    "Failed to deliver live notification"
                );
            }
        }

        CycleOutcome::Completed {
            went_live: diff.went_live.len(),
            went_offline: diff.went_offline.len(),
            delivery_failures,
        }
    }

    /// Fetch once; on `Unauthorized` refresh the credential and fetch at most
    /// one more time.
    async fn fetch_with_refresh(&self) -> Result<Vec<LiveSession>, CycleOutcome> {
        match self.source.fetch_live_statuses(&self.channels).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if e.is_unauthorized() => {
                let token_age_secs = self
                    .credentials
                    .current()
                    .map(|c| (Utc::now() - c.obtained_at()).num_seconds());
                warn!(?token_age_secs, "Access token rejected, refreshing");
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch live statuses");
                return Err(CycleOutcome::Transient);
            }
        }

        if !self.acquire_credential().await {
            return Err(CycleOutcome::AuthFailed);
        }

        match self.source.fetch_live_statuses(&self.channels).await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_unauthorized() => {
                error!("Access token rejected again after refresh, skipping cycle");
                Err(CycleOutcome::Unauthorized)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch live statuses after refresh");
                Err(CycleOutcome::Transient)
            }
        }
    }

    /// Acquire a fresh credential; false means the cycle must be skipped.
    async fn acquire_credential(&self) -> bool {
        let platform = self.credentials.platform_id();
        match self.credentials.acquire().await {
            Ok(_) => true,
            Err(e) if e.is_rejected() => {
                error!(platform, error = %e, "Client credentials rejected, skipping cycle");
                false
            }
            Err(e) => {
                warn!(platform, error = %e, "Failed to acquire access token, skipping cycle");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::credentials::{AuthError, Credential};
    use crate::monitor::FetchError;
    use crate::notification::{ChatId, DeliveryError, MessageTransport};

    struct TestCredentials {
        fail: bool,
        held: Mutex<Option<Arc<Credential>>>,
        acquires: AtomicU32,
    }

    impl TestCredentials {
        fn new(held: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                held: Mutex::new(held.then(|| Arc::new(Credential::new("initial")))),
                acquires: AtomicU32::new(0),
            })
        }

        fn acquires(&self) -> u32 {
            self.acquires.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialManager for TestCredentials {
        fn platform_id(&self) -> &'static str {
            "test"
        }

        async fn acquire(&self) -> Result<Arc<Credential>, AuthError> {
            let attempt = self.acquires.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 400,
                    body: "invalid client".to_string(),
                });
            }
            let credential = Arc::new(Credential::new(format!("token-{attempt}")));
            *self.held.lock().unwrap() = Some(credential.clone());
            Ok(credential)
        }

        fn current(&self) -> Option<Arc<Credential>> {
            self.held.lock().unwrap().clone()
        }
    }

    /// Replays scripted responses; an exhausted script yields an empty snapshot.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<LiveSession>, FetchError>>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<LiveSession>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LiveStatusSource for ScriptedSource {
        fn platform_id(&self) -> &'static str {
            "test"
        }

        async fn fetch_live_statuses(
            &self,
            _channels: &[ChannelName],
        ) -> Result<Vec<LiveSession>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct TestTransport {
        fail_for: Option<&'static str>,
        delivered: Mutex<Vec<String>>,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl MessageTransport for TestTransport {
        fn channel_type(&self) -> &'static str {
            "test"
        }

        async fn send_photo(
            &self,
            _destination: &ChatId,
            _image_url: &str,
            caption: &str,
        ) -> Result<(), DeliveryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(needle) = self.fail_for
                && caption.contains(needle)
            {
                return Err(DeliveryError::Api {
                    code: 400,
                    description: "Bad Request: wrong file identifier".to_string(),
                    retry_after: None,
                });
            }
            self.delivered.lock().unwrap().push(caption.to_string());
            Ok(())
        }

        async fn send_message(
            &self,
            _destination: &ChatId,
            _text: &str,
            _reply_to: Option<i64>,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn live(channel: &str) -> LiveSession {
        LiveSession {
            channel: ChannelName::new(channel),
            session_id: format!("{channel}-1"),
            title: format!("{channel} stream"),
            game_name: String::new(),
            thumbnail_url_template: format!("https://cdn.example/{channel}-{{width}}x{{height}}.jpg"),
            display_name: channel.to_string(),
        }
    }

    fn scheduler(
        credentials: Arc<TestCredentials>,
        source: Arc<ScriptedSource>,
        transport: Arc<TestTransport>,
    ) -> Scheduler {
        let channels = vec![
            ChannelName::new("alice"),
            ChannelName::new("bob"),
            ChannelName::new("carol"),
        ];
        let dispatcher = NotificationDispatcher::new(transport, ChatId::Id(-100));
        Scheduler::new(
            channels,
            credentials,
            source,
            dispatcher,
            SchedulerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_alice_bob_scenario() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![
            Ok(vec![live("alice")]),
            Ok(vec![live("alice"), live("bob")]),
            Ok(vec![live("bob")]),
        ]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source, transport.clone());

        assert_eq!(
            scheduler.run_cycle().await,
            CycleOutcome::Completed {
                went_live: 1,
                went_offline: 0,
                delivery_failures: 0
            }
        );
        assert_eq!(
            scheduler.run_cycle().await,
            CycleOutcome::Completed {
                went_live: 1,
                went_offline: 0,
                delivery_failures: 0
            }
        );
        assert_eq!(
            scheduler.run_cycle().await,
            CycleOutcome::Completed {
                went_live: 0,
                went_offline: 1,
                delivery_failures: 0
            }
        );

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].contains("twitch.tv/alice"));
        assert!(delivered[1].contains("twitch.tv/bob"));
        assert!(!scheduler.tracker().is_live(&ChannelName::new("alice")));
        assert!(scheduler.tracker().is_live(&ChannelName::new("bob")));
        assert_eq!(credentials.acquires(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_missing_credential_is_acquired_first() {
        let credentials = TestCredentials::new(false, false);
        let source = ScriptedSource::new(vec![Ok(vec![live("alice")])]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport);

        let outcome = scheduler.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed { went_live: 1, .. }));
        assert_eq!(credentials.acquires(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_cycle() {
        let credentials = TestCredentials::new(false, true);
        let source = ScriptedSource::new(vec![Ok(vec![live("alice")])]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport);

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::AuthFailed);
        assert_eq!(source.calls(), 0);
        assert_eq!(scheduler.tracker().live_count(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_once_and_retries() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![
            Err(FetchError::Unauthorized),
            Ok(vec![live("bob")]),
        ]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport);

        let outcome = scheduler.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::Completed { went_live: 1, .. }));
        assert_eq!(credentials.acquires(), 1);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_twice_makes_no_third_attempt() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![
            Err(FetchError::Unauthorized),
            Err(FetchError::Unauthorized),
            Ok(vec![live("alice")]),
        ]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport);

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Unauthorized);
        assert_eq!(credentials.acquires(), 1);
        assert_eq!(source.calls(), 2);
        assert_eq!(scheduler.tracker().live_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_after_unauthorized_skips_retry() {
        let credentials = TestCredentials::new(true, true);
        let source = ScriptedSource::new(vec![Err(FetchError::Unauthorized)]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport);

        assert_eq!(scheduler.run_cycle().await, CycleOutcome::AuthFailed);
        assert_eq!(credentials.acquires(), 1);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_live_set() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![
            Ok(vec![live("alice")]),
            Err(FetchError::transient(Some(503), "service unavailable")),
            Ok(vec![live("alice")]),
        ]);
        let transport = Arc::new(TestTransport::default());
        let mut scheduler = scheduler(credentials.clone(), source.clone(), transport.clone());

        scheduler.run_cycle().await;
        assert_eq!(scheduler.run_cycle().await, CycleOutcome::Transient);
        assert_eq!(credentials.acquires(), 0);
        assert!(scheduler.tracker().is_live(&ChannelName::new("alice")));

        // alice never observed offline, so no second notification
        scheduler.run_cycle().await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_block_later_channels() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![Ok(vec![
            live("alice"),
            live("bob"),
            live("carol"),
        ])]);
        let transport = Arc::new(TestTransport {
            fail_for: Some("twitch.tv/alice"),
            ..Default::default()
        });
        let mut scheduler = scheduler(credentials, source, transport.clone());

        assert_eq!(
            scheduler.run_cycle().await,
            CycleOutcome::Completed {
                went_live: 3,
                went_offline: 0,
                delivery_failures: 1
            }
        );
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(transport.delivered.lock().unwrap().len(), 2);
        // a failed delivery still counts as notified
        assert!(scheduler.tracker().is_live(&ChannelName::new("alice")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let credentials = TestCredentials::new(true, false);
        let source = ScriptedSource::new(vec![]);
        let transport = Arc::new(TestTransport::default());
        let scheduler = scheduler(credentials, source.clone(), transport);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        // first cycle runs immediately, the second after one interval
        tokio::time::sleep(DEFAULT_POLL_INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(source.calls(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }
}
