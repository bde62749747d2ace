//! Datagram listener and per-message dispatch
//!
//! [`Engine::listen_and_serve`] owns the UDP socket for its whole lifetime
//! and runs two loops side by side:
//!
//! - the receive loop reads datagrams, decodes them and pushes the resulting
//!   [`Message`]s on the inbound channel;
//! - the dispatch loop takes messages off the inbound channel and hands each
//!   one to [`Engine::dispatch`], which runs the pipeline in its own task.
//!
//! Both loops watch the engine's cancellation token. Decode failures are
//! reported and the receive loop carries on; a socket read failure stops the
//! engine. Each pipeline task gets a child token, so cancelling the root
//! stops every in-flight pipeline at its next step boundary.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sigflow_sip_core::{CallDetailSender, Message};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::channels::ChannelMap;
use crate::error::{EngineError, Result};
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::step::{Step, StepContext};

/// Receive buffer size used unless configured otherwise
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Builds the call-detail handle attached to each received message
pub type DetailFactory = Arc<dyn Fn() -> Box<dyn CallDetailSender> + Send + Sync>;

/// What happens to in-flight pipelines when the engine shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Return as soon as the listener is released
    #[default]
    Immediate,
    /// Wait up to `timeout` for in-flight pipelines to stop
    Drain { timeout: Duration },
}

/// Where the receive loop reads datagrams from
#[async_trait]
pub(crate) trait DatagramSource: Send + Sync {
    async fn recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

#[async_trait]
impl DatagramSource for UdpSocket {
    async fn recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buffer).await
    }
}

/// The pipeline engine
pub struct Engine {
    address: String,
    cancel: CancellationToken,
    inbound_tx: mpsc::Sender<Message>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    egress: mpsc::Sender<Message>,
    errors: mpsc::Sender<EngineError>,
    pipeline: Pipeline,
    tracker: TaskTracker,
    buffer_size: usize,
    shutdown_policy: ShutdownPolicy,
    detail_factory: Option<DetailFactory>,
    local_addr: watch::Sender<Option<SocketAddr>>,
}

impl Engine {
    /// An engine listening on `address` with default settings
    pub fn new(
        address: impl Into<String>,
        cancel: CancellationToken,
        channels: ChannelMap,
        steps: Vec<Arc<dyn Step>>,
    ) -> Self {
        EngineBuilder::new(address, cancel, channels).steps(steps).build()
    }

    pub fn builder(
        address: impl Into<String>,
        cancel: CancellationToken,
        channels: ChannelMap,
    ) -> EngineBuilder {
        EngineBuilder::new(address, cancel, channels)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        self.shutdown_policy
    }

    /// Address the socket is bound to, while serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    /// Wait until the socket is bound and return its address.
    ///
    /// Returns `None` if the engine is dropped first.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.local_addr.subscribe();
        let addr = *rx.wait_for(Option::is_some).await.ok()?;
        addr
    }

    /// Number of pipelines still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Run the pipeline over `message` in its own task
    pub fn dispatch(&self, message: Message) -> JoinHandle<PipelineOutcome> {
        self.spawn_pipeline(message, &self.cancel)
    }

    fn spawn_pipeline(
        &self,
        mut message: Message,
        parent: &CancellationToken,
    ) -> JoinHandle<PipelineOutcome> {
        let pipeline = self.pipeline.clone();
        let errors = self.errors.clone();
        let mut ctx = StepContext::new(parent.child_token(), self.egress.clone());

        let span = info_span!(
            "pipeline",
            call_id = message.call_id().unwrap_or("-"),
            source = ?message.source,
        );

        self.tracker.spawn(
            async move {
                let outcome = pipeline.run(&mut message, &mut ctx, &errors).await;
                trace!(?outcome, "Pipeline finished");
                outcome
            }
            .instrument(span),
        )
    }

    /// Bind the socket and serve until cancelled.
    ///
    /// Always returns an error: [`EngineError::ShutdownSignalled`] after a
    /// clean shutdown, [`EngineError::Bind`] if the socket cannot be bound,
    /// or [`EngineError::Transport`] if reading from it failed.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let inbound = self
            .inbound_rx
            .lock()
            .take()
            .ok_or(EngineError::AlreadyServing)?;

        let (socket, local) = match self.bind().await {
            Ok(bound) => bound,
            Err(e) => {
                *self.inbound_rx.lock() = Some(inbound);
                return Err(e);
            }
        };

        self.serve(socket, local, inbound).await
    }

    /// Run both loops over `socket` until cancellation or a read failure,
    /// then release it.
    async fn serve<S: DatagramSource>(
        &self,
        socket: S,
        local: SocketAddr,
        inbound: mpsc::Receiver<Message>,
    ) -> Result<()> {
        info!("Listening for SIP datagrams on {}", local);
        self.local_addr.send_replace(Some(local));

        // Stops both loops on root cancellation or on a read failure
        let shutdown = self.cancel.child_token();

        let (received, ()) = tokio::join!(
            self.receive_loop(&socket, &shutdown),
            self.dispatch_loop(inbound, &shutdown),
        );

        self.local_addr.send_replace(None);
        drop(socket);
        info!("Released listener on {}", local);

        self.finish().await;

        received?;
        Err(EngineError::ShutdownSignalled)
    }

    async fn bind(&self) -> Result<(UdpSocket, SocketAddr)> {
        let bind_error = |error| EngineError::Bind {
            address: self.address.clone(),
            error,
        };
        let socket = UdpSocket::bind(&self.address).await.map_err(bind_error)?;
        let local = socket.local_addr().map_err(bind_error)?;
        Ok((socket, local))
    }

    async fn receive_loop<S: DatagramSource>(
        &self,
        socket: &S,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let mut buffer = vec![0u8; self.buffer_size.max(1)];

        loop {
            let (len, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Receive loop cancelled");
                    return Ok(());
                }
                received = socket.recv_from(&mut buffer) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving UDP datagram: {}", e);
                        let copy = io::Error::new(e.kind(), e.to_string());
                        self.report(EngineError::Transport(copy), shutdown).await;
                        shutdown.cancel();
                        return Err(EngineError::Transport(e));
                    }
                },
            };

            trace!("Received {} bytes from {}", len, peer);

            let mut message = match Message::decode_from(Bytes::copy_from_slice(&buffer[..len]), peer) {
                Ok(message) => message,
                Err(error) => {
                    warn!("Dropping undecodable datagram from {}: {}", peer, error);
                    self.report(
                        EngineError::Decode {
                            peer: Some(peer),
                            error,
                        },
                        shutdown,
                    )
                    .await;
                    continue;
                }
            };

            if let Some(factory) = &self.detail_factory {
                message.set_detail(factory());
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                sent = self.inbound_tx.send(message) => {
                    if sent.is_err() {
                        warn!("Inbound channel closed, stopping receive loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn dispatch_loop(&self, mut inbound: mpsc::Receiver<Message>, shutdown: &CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Dispatch loop cancelled");
                    break;
                }
                message = inbound.recv() => match message {
                    Some(message) => {
                        self.spawn_pipeline(message, shutdown);
                    }
                    None => break,
                },
            }
        }
    }

    async fn report(&self, error: EngineError, shutdown: &CancellationToken) {
        tokio::select! {
            sent = self.errors.send(error) => {
                if sent.is_err() {
                    debug!("Error channel closed");
                }
            }
            _ = shutdown.cancelled() => {}
        }
    }

    async fn finish(&self) {
        match self.shutdown_policy {
            ShutdownPolicy::Immediate => {
                debug!(in_flight = self.tracker.len(), "Not waiting for in-flight pipelines");
            }
            ShutdownPolicy::Drain { timeout } => {
                self.tracker.close();
                info!(in_flight = self.tracker.len(), "Draining in-flight pipelines");
                if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
                    warn!(
                        in_flight = self.tracker.len(),
                        "Drain timed out after {:?}", timeout
                    );
                }
                self.tracker.reopen();
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("address", &self.address)
            .field("pipeline", &self.pipeline)
            .field("buffer_size", &self.buffer_size)
            .field("shutdown_policy", &self.shutdown_policy)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    address: String,
    cancel: CancellationToken,
    channels: ChannelMap,
    steps: Vec<Arc<dyn Step>>,
    buffer_size: usize,
    shutdown_policy: ShutdownPolicy,
    detail_factory: Option<DetailFactory>,
}

impl EngineBuilder {
    pub fn new(address: impl Into<String>, cancel: CancellationToken, channels: ChannelMap) -> Self {
        Self {
            address: address.into(),
            cancel,
            channels,
            steps: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_policy: ShutdownPolicy::default(),
            detail_factory: None,
        }
    }

    /// Append a step
    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Arc<dyn Step>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    /// Replace the default call-detail handle on every received message
    pub fn detail_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn CallDetailSender> + Send + Sync + 'static,
    {
        self.detail_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Engine {
        let ChannelMap {
            inbound_tx,
            inbound_rx,
            egress,
            errors,
        } = self.channels;
        let (local_addr, _) = watch::channel(None);

        Engine {
            address: self.address,
            cancel: self.cancel,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            egress,
            errors,
            pipeline: Pipeline::new(self.steps),
            tracker: TaskTracker::new(),
            buffer_size: self.buffer_size,
            shutdown_policy: self.shutdown_policy,
            detail_factory: self.detail_factory,
            local_addr,
        }
    }
}
