//! Live per-job update channel.
//!
//! [`JobChannel`] spawns one driver task per job. The driver owns the pure
//! [`ChannelState`] machine from `jobstream_core`, the connection handle and
//! the reconnect timer, and is the only place observer callbacks run.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jobstream_core::{
    update, ChannelState, ChannelView, Effect, InvalidJobId, JobId, LinkState, Msg,
    ReconnectPolicy, UpdateEnvelope, CLOSE_ABNORMAL,
};
use jobstream_logging::{stream_debug, stream_info, stream_warn};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use crate::transport::{Connection, Connector, TransportEvent, WsConnector};
use crate::{ConfigError, ConfigResolver, RuntimeConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("runtime configuration is not loaded yet")]
    ConfigNotReady,
    #[error(transparent)]
    InvalidJobId(#[from] InvalidJobId),
    #[error("cannot build job stream url: {0}")]
    InvalidUrl(String),
    #[error("no tokio runtime available to drive the channel")]
    NoRuntime,
}

impl From<ConfigError> for ChannelError {
    fn from(err: ConfigError) -> Self {
        match err {
            // A failed fetch leaves the resolver without a document.
            ConfigError::NotReady | ConfigError::Fetch(_) => ChannelError::ConfigNotReady,
            ConfigError::InvalidUrl(url) => ChannelError::InvalidUrl(url),
        }
    }
}

/// Caller-side callbacks. All of them run on the channel's driver task, one at
/// a time, and never after the channel was closed.
pub trait JobObserver: Send + 'static {
    fn on_update(&mut self, update: &UpdateEnvelope, control: &ChannelControl);

    fn on_error(&mut self, _message: &str, _control: &ChannelControl) {}

    fn on_close(&mut self, _code: Option<u16>, _control: &ChannelControl) {}
}

/// Observer callbacks as plain values, for callers that prefer a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Update(UpdateEnvelope),
    Error(String),
    Closed(Option<u16>),
}

impl JobObserver for mpsc::UnboundedSender<ChannelEvent> {
    fn on_update(&mut self, update: &UpdateEnvelope, _control: &ChannelControl) {
        let _ = self.send(ChannelEvent::Update(update.clone()));
    }

    fn on_error(&mut self, message: &str, _control: &ChannelControl) {
        let _ = self.send(ChannelEvent::Error(message.to_string()));
    }

    fn on_close(&mut self, code: Option<u16>, _control: &ChannelControl) {
        let _ = self.send(ChannelEvent::Closed(code));
    }
}

/// Cheap handle that can close the channel from anywhere, including from
/// inside an observer callback.
#[derive(Debug, Clone)]
pub struct ChannelControl {
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl ChannelControl {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Idempotent. Takes effect immediately: no callback and no reconnect
    /// happens after this returns.
    pub fn close(&self) {
        self.cancel.cancel();
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_connected(&self) -> bool {
        !self.is_closed() && self.connected.load(Ordering::SeqCst)
    }
}

pub struct ChannelOptions {
    pub policy: ReconnectPolicy,
    pub connector: Arc<dyn Connector>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            connector: Arc::new(WsConnector::default()),
        }
    }
}

/// A live subscription to one job's update stream. Dropping it closes it.
pub struct JobChannel {
    job_id: JobId,
    control: ChannelControl,
    view_rx: watch::Receiver<ChannelView>,
}

impl JobChannel {
    /// Opens with the default WebSocket transport and reconnect policy.
    pub fn open<O: JobObserver>(
        config: &RuntimeConfig,
        job_id: &str,
        observer: O,
    ) -> Result<Self, ChannelError> {
        Self::open_with_options(config, job_id, observer, ChannelOptions::default())
    }

    /// Fails fast with [`ChannelError::ConfigNotReady`] until `resolver` has
    /// loaded the runtime configuration.
    pub fn open_with_resolver<O: JobObserver>(
        resolver: &ConfigResolver,
        job_id: &str,
        observer: O,
        options: ChannelOptions,
    ) -> Result<Self, ChannelError> {
        let config = resolver.current()?;
        Self::open_with_options(config, job_id, observer, options)
    }

    pub fn open_with_options<O: JobObserver>(
        config: &RuntimeConfig,
        job_id: &str,
        observer: O,
        options: ChannelOptions,
    ) -> Result<Self, ChannelError> {
        let job_id = JobId::new(job_id)?;
        let url = config.job_stream_url(&job_id)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;

        let state = ChannelState::new(job_id.clone(), url.as_str(), options.policy);
        let (view_tx, view_rx) = watch::channel(state.view());
        let control = ChannelControl::new();

        stream_info!("Opening job channel job_id={} url={}", job_id, url);
        let driver = Driver {
            state: Some(state),
            observer,
            control: control.clone(),
            connector: options.connector,
            connection: None,
            reconnect_timer: None,
            view_tx,
            inbox: VecDeque::new(),
        };
        runtime.spawn(driver.run());

        Ok(Self {
            job_id,
            control,
            view_rx,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Idempotent; see [`ChannelControl::close`].
    pub fn close(&self) {
        self.control.close();
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    pub fn control(&self) -> ChannelControl {
        self.control.clone()
    }

    /// Latest observable state.
    pub fn view(&self) -> ChannelView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelView> {
        self.view_rx.clone()
    }
}

impl Drop for JobChannel {
    fn drop(&mut self) {
        self.control.close();
    }
}

enum Wake {
    Closed,
    Transport(TransportEvent),
    ReconnectDue,
}

struct Driver<O> {
    // Only `None` while `update` owns it.
    state: Option<ChannelState>,
    observer: O,
    control: ChannelControl,
    connector: Arc<dyn Connector>,
    connection: Option<Box<dyn Connection>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    view_tx: watch::Sender<ChannelView>,
    inbox: VecDeque<Msg>,
}

impl<O: JobObserver> Driver<O> {
    async fn run(mut self) {
        self.inbox.push_back(Msg::OpenRequested);
        self.drain().await;

        while !self.is_settled() {
            let cancel = self.control.cancel.clone();
            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Closed,
                event = next_event(&mut self.connection) => Wake::Transport(event),
                _ = reconnect_elapsed(&mut self.reconnect_timer) => Wake::ReconnectDue,
            };
            match wake {
                Wake::Closed => {}
                Wake::Transport(event) => self.on_transport_event(event),
                Wake::ReconnectDue => {
                    self.reconnect_timer = None;
                    self.inbox.push_back(Msg::ReconnectDue);
                }
            }
            self.drain().await;
        }

        if let Some(state) = &self.state {
            stream_debug!(
                "Job channel job_id={} settled after {} reconnect attempts",
                state.job_id(),
                state.reconnect_attempts()
            );
        }
    }

    fn is_settled(&self) -> bool {
        self.connection.is_none()
            && self
                .state
                .as_ref()
                .map_or(true, |state| state.link() == LinkState::Disconnected)
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Text(raw) => self.inbox.push_back(Msg::FrameReceived(raw)),
            TransportEvent::Closed { code } => {
                self.connection = None;
                self.inbox.push_back(Msg::ConnectionClosed { code });
            }
            TransportEvent::Failed(message) => {
                self.connection = None;
                self.inbox.push_back(Msg::TransportFailed(message));
                self.inbox.push_back(Msg::ConnectionClosed {
                    code: Some(CLOSE_ABNORMAL),
                });
            }
        }
    }

    /// A pending close request jumps the queue.
    fn next_msg(&mut self) -> Option<Msg> {
        let state_closed = self.state.as_ref().map_or(true, ChannelState::is_closed);
        if self.control.is_closed() && !state_closed {
            return Some(Msg::CloseRequested);
        }
        self.inbox.pop_front()
    }

    async fn drain(&mut self) {
        while let Some(msg) = self.next_msg() {
            let Some(state) = self.state.take() else {
                return;
            };
            let (mut state, effects) = update(state, msg);
            if state.consume_dirty() {
                let view = state.view();
                self.control
                    .connected
                    .store(view.is_connected(), Ordering::SeqCst);
                self.view_tx.send_replace(view);
            }
            self.state = Some(state);

            for effect in effects {
                self.run_effect(effect).await;
            }
        }
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Connect { url } => self.connect(&url).await,
            Effect::ScheduleReconnect { attempt, delay } => {
                stream_info!(
                    "Job channel reconnect attempt {} scheduled in {:?} url={}",
                    attempt,
                    delay,
                    self.stream_url()
                );
                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            Effect::CancelReconnect => self.reconnect_timer = None,
            Effect::Disconnect => {
                if let Some(mut connection) = self.connection.take() {
                    connection.close().await;
                }
            }
            Effect::NotifyUpdate(envelope) => {
                if !self.control.is_closed() {
                    self.observer.on_update(&envelope, &self.control);
                }
            }
            Effect::NotifyError(message) => {
                stream_warn!("Job channel error url={}: {}", self.stream_url(), message);
                if !self.control.is_closed() {
                    self.observer.on_error(&message, &self.control);
                }
            }
            Effect::NotifyClose { code } => {
                stream_debug!("Job channel closed url={} code={:?}", self.stream_url(), code);
                if !self.control.is_closed() {
                    self.observer.on_close(code, &self.control);
                }
            }
            // Never reaches the observer.
            Effect::FrameDiscarded { reason } => {
                stream_debug!("Discarded malformed frame url={}: {}", self.stream_url(), reason);
            }
        }
    }

    async fn connect(&mut self, url: &str) {
        let connector = Arc::clone(&self.connector);
        let cancel = self.control.cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = connector.connect(url) => Some(outcome),
        };
        match outcome {
            // `next_msg` turns the cancellation into `CloseRequested`.
            None => {}
            Some(Ok(connection)) => {
                self.connection = Some(connection);
                self.inbox.push_back(Msg::Connected);
            }
            Some(Err(err)) => {
                self.inbox.push_back(Msg::TransportFailed(err.to_string()));
                self.inbox.push_back(Msg::ConnectionClosed {
                    code: Some(CLOSE_ABNORMAL),
                });
            }
        }
    }

    fn stream_url(&self) -> &str {
        self.state.as_ref().map_or("", ChannelState::url)
    }
}

async fn next_event(connection: &mut Option<Box<dyn Connection>>) -> TransportEvent {
    match connection {
        Some(connection) => connection.recv().await,
        None => pending().await,
    }
}

async fn reconnect_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
