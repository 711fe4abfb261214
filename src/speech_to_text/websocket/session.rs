//! Recognition session: connection lifecycle, paced sending, and dispatch of
//! server frames to the caller's callback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Interval, MissedTickBehavior, interval, timeout};
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, info, warn};

use super::audio::{AudioFeed, AudioSource};
use super::callback::RecognizeCallback;
use super::messages::{ControlMessage, ServerFrame};
use super::options::{RecognitionOptions, RecognizeUrlParams};
use super::pacer::{AudioPacer, Chunk};
use super::{TICK_INTERVAL, tls};
use crate::error::{SdkError, SdkResult};
use crate::service::BaseService;

/// Upper bound on the WebSocket handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Builder
// =============================================================================

/// Collects everything a [`RecognizeSession`] needs.
pub struct RecognizeBuilder {
    service: BaseService,
    audio: Option<AudioSource>,
    options: RecognitionOptions,
    url_params: RecognizeUrlParams,
    callback: Option<Arc<dyn RecognizeCallback>>,
    learning_opt_out: bool,
}

impl RecognizeBuilder {
    pub(crate) fn new(service: BaseService) -> Self {
        Self {
            service,
            audio: None,
            options: RecognitionOptions::default(),
            url_params: RecognizeUrlParams::default(),
            callback: None,
            learning_opt_out: false,
        }
    }

    pub fn audio(mut self, audio: AudioSource) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Push mode: audio arrives through `feed`.
    pub fn audio_feed(mut self, feed: AudioFeed) -> Self {
        self.audio = Some(AudioSource::Push(feed));
        self
    }

    /// Replace all start-frame options. A previously set content type is kept
    /// unless `options` sets its own.
    pub fn options(mut self, options: RecognitionOptions) -> Self {
        let content_type = self.options.content_type.take();
        self.options = options;
        if self.options.content_type.is_none() {
            self.options.content_type = content_type;
        }
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.options.content_type = Some(content_type.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.url_params.model = Some(model.into());
        self
    }

    pub fn language_customization_id(mut self, id: impl Into<String>) -> Self {
        self.url_params.language_customization_id = Some(id.into());
        self
    }

    pub fn acoustic_customization_id(mut self, id: impl Into<String>) -> Self {
        self.url_params.acoustic_customization_id = Some(id.into());
        self
    }

    pub fn base_model_version(mut self, version: impl Into<String>) -> Self {
        self.url_params.base_model_version = Some(version.into());
        self
    }

    pub fn callback(mut self, callback: Arc<dyn RecognizeCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Ask the service not to use this request's data for training.
    pub fn learning_opt_out(mut self, opt_out: bool) -> Self {
        self.learning_opt_out = opt_out;
        self
    }

    /// Validate and create the session. Nothing is sent until
    /// [`RecognizeSession::start`].
    pub fn build(self) -> SdkResult<RecognizeSession> {
        let callback = self.callback.ok_or_else(|| {
            SdkError::Configuration("A recognize callback is required".to_string())
        })?;
        let audio = self.audio.ok_or_else(|| {
            SdkError::Configuration(
                "An audio source is required unless an audio feed is used".to_string(),
            )
        })?;

        let url = self.url_params.build_url(self.service.service_url())?;
        let start_message = self.options.start_message()?.to_string();
        let feed = match &audio {
            AudioSource::Push(feed) => Some(feed.clone()),
            AudioSource::Finite { .. } => None,
        };

        Ok(RecognizeSession {
            service: self.service,
            url,
            start_message,
            learning_opt_out: self.learning_opt_out,
            callback,
            feed,
            pacer: AudioPacer::new(audio),
            state: SessionState::Connecting,
            server: ServerPhase::AwaitingAck,
            stats: SessionStats::default(),
        })
    }
}

// =============================================================================
// State
// =============================================================================

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Handshake in progress.
    Connecting,
    /// Start frame sent, no audio yet.
    Started,
    /// Audio flowing.
    Streaming,
    /// Stop frame sent, waiting for the service to finish.
    Draining,
    Closed,
}

/// What the service has acknowledged so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerPhase {
    AwaitingAck,
    Listening,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Audio bytes written to the socket.
    pub bytes_sent: u64,
    /// Audio bytes read from a finite source, or pushed into the feed.
    pub bytes_supplied: u64,
    /// Non-empty audio frames written to the socket.
    pub chunks_sent: u64,
    /// Whether the service signalled completion.
    pub completed: bool,
}

// =============================================================================
// Session
// =============================================================================

/// One recognition request over one WebSocket connection.
pub struct RecognizeSession {
    service: BaseService,
    url: String,
    start_message: String,
    learning_opt_out: bool,
    callback: Arc<dyn RecognizeCallback>,
    feed: Option<AudioFeed>,
    pacer: AudioPacer,
    state: SessionState,
    server: ServerPhase,
    stats: SessionStats,
}

impl fmt::Debug for RecognizeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizeSession")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("push_mode", &self.feed.is_some())
            .finish()
    }
}

impl RecognizeSession {
    /// Connection URL, including query parameters.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The producer handle when running in push mode.
    pub fn audio_feed(&self) -> Option<AudioFeed> {
        self.feed.clone()
    }

    /// Connect and drive the session until the connection closes.
    ///
    /// Connection failures, server errors and transport faults are reported
    /// through the callback; the returned error is reserved for handshake
    /// headers that cannot be encoded.
    pub async fn start(self) -> SdkResult<SessionStats> {
        tls::ensure_crypto_provider();

        let mut request = self.url.as_str().into_client_request()?;
        let headers = match self.service.handshake_headers().await {
            Ok(headers) => headers,
            Err(e) => {
                warn!("Failed to obtain credentials for recognition: {}", e);
                self.callback.on_error(&e);
                return Ok(self.stats);
            }
        };
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| SdkError::Configuration(format!("Invalid header name {key}: {e}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| SdkError::Configuration(format!("Invalid value for {key}: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        if self.learning_opt_out {
            request.headers_mut().insert(
                HeaderName::from_static("x-watson-learning-opt-out"),
                HeaderValue::from_static("true"),
            );
        }

        let connector = if self.service.disable_ssl_verification() {
            Some(tls::insecure_connector()?)
        } else {
            None
        };

        info!("Connecting to recognition service");
        let connected = timeout(
            CONNECT_TIMEOUT,
            connect_async_tls_with_config(request, None, false, connector),
        )
        .await;

        match connected {
            Ok(Ok((ws_stream, _response))) => Ok(self.run(ws_stream).await),
            Ok(Err(e)) => {
                let error = SdkError::WebSocket(format!("Failed to connect: {e}"));
                warn!("{}", error);
                self.callback.on_error(&error);
                Ok(self.stats)
            }
            Err(_) => {
                let error = SdkError::WebSocket(format!(
                    "Connection timed out after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                ));
                warn!("{}", error);
                self.callback.on_error(&error);
                Ok(self.stats)
            }
        }
    }

    /// Drive an established connection to completion.
    pub(crate) async fn run<S>(mut self, ws: S) -> SessionStats
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
    {
        let (mut sink, mut stream) = ws.split();
        self.on_connect(&mut sink).await;

        let mut timer = if self.state == SessionState::Started {
            let mut timer = interval(TICK_INTERVAL);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(timer)
        } else {
            None
        };

        while self.state != SessionState::Closed {
            tokio::select! {
                _ = next_tick(&mut timer) => {
                    self.on_tick(&mut sink, &mut timer).await;
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(message)) => self.on_message(message, &mut sink, &mut timer).await,
                        Some(Err(e)) => {
                            let error = SdkError::WebSocket(e.to_string());
                            warn!("Recognition connection error: {}", error);
                            self.callback.on_error(&error);
                            self.on_close(&mut timer);
                        }
                        None => self.on_close(&mut timer),
                    }
                }
            }
        }

        self.stats.bytes_supplied = self.pacer.bytes_supplied();
        info!(
            bytes_sent = self.stats.bytes_sent,
            chunks_sent = self.stats.chunks_sent,
            completed = self.stats.completed,
            "Recognition session closed"
        );
        self.stats
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("Recognition session {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    async fn on_connect<K>(&mut self, sink: &mut K)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        info!("Connected to recognition service");
        self.callback.on_connected();

        match sink.send(Message::Text(self.start_message.clone().into())).await {
            Ok(()) => {
                debug!("Sent start message");
                self.transition(SessionState::Started);
            }
            Err(e) => {
                self.fail(SdkError::WebSocket(format!("Failed to send start message: {e}")));
            }
        }
    }

    async fn on_tick<K>(&mut self, sink: &mut K, timer: &mut Option<Interval>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        if self.pacer.is_finished() {
            cancel(timer);
            return;
        }
        match self.pacer.next_chunk().await {
            Ok(Some(chunk)) => self.send_chunk(sink, chunk, timer).await,
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to read audio: {}", e);
                self.callback.on_error(&e);
                self.close_socket(sink, timer).await;
            }
        }
    }

    async fn send_chunk<K>(&mut self, sink: &mut K, chunk: Chunk, timer: &mut Option<Interval>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        if !chunk.data.is_empty() {
            let len = chunk.data.len() as u64;
            if let Err(e) = sink.send(Message::Binary(chunk.data)).await {
                self.fail(SdkError::WebSocket(format!("Failed to send audio: {e}")));
                cancel(timer);
                return;
            }
            self.stats.bytes_sent += len;
            self.stats.chunks_sent += 1;
            if self.state == SessionState::Started {
                self.transition(SessionState::Streaming);
            }
        }

        if chunk.is_final {
            cancel(timer);
            let sent = match ControlMessage::stop().to_json() {
                Ok(stop) => sink.send(Message::Text(stop.into())).await.map_err(SdkError::from),
                Err(e) => Err(e),
            };
            match sent {
                Ok(()) => {
                    debug!(bytes_sent = self.stats.bytes_sent, "Sent stop message");
                    self.transition(SessionState::Draining);
                }
                Err(e) => self.fail(SdkError::WebSocket(format!("Failed to send stop message: {e}"))),
            }
        }
    }

    async fn on_message<K>(&mut self, message: Message, sink: &mut K, timer: &mut Option<Interval>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        match message {
            Message::Text(text) => {
                let text: &str = &text;
                debug!("Received recognition message: {}", text);
                match ServerFrame::decode(text) {
                    Some(frame) => self.dispatch(frame, sink, timer).await,
                    None => debug!("Ignoring unrecognized recognition message"),
                }
            }
            Message::Close(frame) => {
                info!("Recognition service closed the connection: {:?}", frame);
                // Send the queued close reply before the socket is dropped.
                if let Err(e) = sink.flush().await {
                    debug!("Close reply not delivered: {}", e);
                }
                self.on_close(timer);
            }
            _ => {}
        }
    }

    async fn dispatch<K>(&mut self, frame: ServerFrame, sink: &mut K, timer: &mut Option<Interval>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        let inactivity = frame.is_inactivity_timeout();
        match frame {
            ServerFrame::Error(message) => {
                if inactivity {
                    info!("Recognition inactivity timeout: {}", message);
                    self.callback
                        .on_inactivity_timeout(&SdkError::InactivityTimeout(message));
                } else {
                    warn!("Recognition error: {}", message);
                    self.callback.on_error(&SdkError::Recognition(message));
                }
            }
            ServerFrame::State(state) => match self.server {
                ServerPhase::AwaitingAck => {
                    debug!("Recognition service is {}", state);
                    self.server = ServerPhase::Listening;
                }
                ServerPhase::Listening => {
                    debug!("Recognition service finished");
                    match ControlMessage::close().to_json() {
                        Ok(close) => {
                            if let Err(e) = sink.send(Message::Text(close.into())).await {
                                warn!("Failed to send close message: {}", e);
                            }
                        }
                        Err(e) => warn!("Failed to encode close message: {}", e),
                    }
                    self.stats.completed = true;
                    self.callback.on_transcription_complete();
                    self.close_socket(sink, timer).await;
                }
            },
            ServerFrame::Results { content, raw } => {
                if let Some(content) = content {
                    if content.is_final {
                        self.callback.on_hypothesis(&content.hypothesis);
                    }
                    self.callback.on_transcription(&content.alternatives);
                }
                self.callback.on_data(&raw);
            }
        }
    }

    /// Close the socket with a normal closure code and end the session.
    async fn close_socket<K>(&mut self, sink: &mut K, timer: &mut Option<Interval>)
    where
        K: Sink<Message, Error = WsError> + Unpin,
    {
        if self.state == SessionState::Closed {
            return;
        }
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
        self.on_close(timer);
    }

    fn on_close(&mut self, timer: &mut Option<Interval>) {
        cancel(timer);
        self.transition(SessionState::Closed);
    }

    /// Report a fatal send failure and stop.
    fn fail(&mut self, error: SdkError) {
        warn!("{}", error);
        self.callback.on_error(&error);
        self.transition(SessionState::Closed);
    }
}

/// Wait for the next tick; pends forever once the timer is cancelled.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn cancel(timer: &mut Option<Interval>) {
    timer.take();
}
