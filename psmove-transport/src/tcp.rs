//! TCP transport backed by a background worker thread
//!
//! The worker owns a single-threaded tokio runtime, the socket and the frame
//! decoder. The consumer side talks to it through a command channel and hears
//! back through the [`EventSender`] handed over in [`Transport::startup`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TrySendError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use psmove_protocol::{encode_frame, FrameDecoder, ProtocolError, Request, ServiceMessage};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::event::{EventSender, TransportEvent};
use crate::Transport;

/// Size of a single socket read
const READ_CHUNK_SIZE: usize = 4096;

/// How often a worker blocked on a full arrival channel retries
const BACKPRESSURE_RETRY: Duration = Duration::from_millis(1);

/// Commands sent from the consumer thread to the connection worker
#[derive(Debug)]
enum Command {
    /// Encode and write a request
    Send(Request),
    /// Close the socket and stop the worker
    Shutdown,
}

/// Connection to the service over TCP
pub struct TcpTransport {
    config: TransportConfig,

    /// Send commands to the background worker
    command_tx: Option<mpsc::UnboundedSender<Command>>,

    /// Background worker handle
    worker: Option<JoinHandle<()>>,

    /// Set by the worker while the socket is open
    connected: Arc<AtomicBool>,

    /// Set by `shutdown` so a worker waiting on a full channel gives up
    stopping: Arc<AtomicBool>,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            command_tx: None,
            worker: None,
            connected: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for TcpTransport {
    fn startup(&mut self, events: EventSender) -> Result<()> {
        if self.worker.is_some() {
            return Err(TransportError::AlreadyStarted);
        }
        self.config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let connected = Arc::clone(&self.connected);
        self.stopping.store(false, Ordering::SeqCst);
        let worker_state = WorkerState {
            events,
            connected,
            stopping: Arc::clone(&self.stopping),
        };

        let worker = thread::Builder::new()
            .name("psmove-transport".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("Failed to create tokio runtime for transport worker: {}", e);
                        let _ = worker_state.events.try_send(TransportEvent::ConnectionOpenFailed {
                            reason: e.to_string(),
                        });
                        return;
                    }
                };

                rt.block_on(run_connection(config, command_rx, worker_state));
            })?;

        self.command_tx = Some(command_tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn send_request(&mut self, request: Request) -> Result<()> {
        let command_tx = self.command_tx.as_ref().ok_or(TransportError::NotStarted)?;
        command_tx
            .send(Command::Send(request))
            .map_err(|_| TransportError::WorkerDisconnected)
    }

    fn shutdown(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
        if let Some(command_tx) = self.command_tx.take() {
            // The worker may already be gone after a failed connect
            let _ = command_tx.send(Command::Shutdown);
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Transport worker panicked");
            }
        }

        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker-side ends of the shared connection state
struct WorkerState {
    events: EventSender,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
}

impl WorkerState {
    /// Deliver an arrival, waiting while the consumer's channel is full
    ///
    /// Waiting here keeps the worker out of its read loop, so a consumer that
    /// stops calling `update()` stops the socket from being read. Returns
    /// `false` when the consumer is gone or a shutdown was requested.
    async fn emit(&self, mut event: TransportEvent) -> bool {
        loop {
            match self.events.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    if self.stopping.load(Ordering::SeqCst) {
                        tracing::debug!("Dropping {} during shutdown", returned.name());
                        return false;
                    }
                    event = returned;
                    tokio::time::sleep(BACKPRESSURE_RETRY).await;
                }
                Err(TrySendError::Disconnected(returned)) => {
                    tracing::debug!("Arrival receiver dropped, discarding {}", returned.name());
                    return false;
                }
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

/// Worker body: connect, then pump socket reads and outbound commands
async fn run_connection(
    config: TransportConfig,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    state: WorkerState,
) {
    let address = config.socket_address();
    tracing::debug!("Connecting to service at {}", address);

    let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            state
                .emit(TransportEvent::ConnectionOpenFailed {
                    reason: e.to_string(),
                })
                .await;
            return;
        }
        Err(_) => {
            state
                .emit(TransportEvent::ConnectionOpenFailed {
                    reason: format!("timed out after {:?}", config.connect_timeout),
                })
                .await;
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!("Failed to set TCP_NODELAY: {}", e);
    }

    state.set_connected(true);
    state.emit(TransportEvent::ConnectionOpened).await;

    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = FrameDecoder::new();
    let mut read_buffer = vec![0u8; READ_CHUNK_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut read_buffer) => {
                match read {
                    Ok(0) => {
                        tracing::debug!("Service closed the connection");
                        break;
                    }
                    Ok(n) => {
                        decoder.extend(&read_buffer[..n]);
                        match forward_frames(&mut decoder, &state).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => {
                                state.emit(TransportEvent::SocketError { reason: e.to_string() }).await;
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        state.emit(TransportEvent::SocketError { reason: e.to_string() }).await;
                        break;
                    }
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(Command::Send(request)) => {
                        let frame = match encode_frame(&request) {
                            Ok(frame) => frame,
                            Err(e) => {
                                tracing::warn!("Dropping request {}: {}", request.request_id, e);
                                continue;
                            }
                        };
                        if let Err(e) = writer.write_all(&frame).await {
                            state.emit(TransportEvent::SocketError { reason: e.to_string() }).await;
                            break;
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        state.set_connected(false);
                        let closed = match writer.shutdown().await {
                            Ok(()) => TransportEvent::ConnectionClosed,
                            Err(e) => TransportEvent::ConnectionCloseFailed { reason: e.to_string() },
                        };
                        state.emit(closed).await;
                        return;
                    }
                }
            }
        }
    }

    state.set_connected(false);
    state.emit(TransportEvent::ConnectionClosed).await;
}

/// Forward every complete frame in the decoder
///
/// Malformed bodies are skipped; an oversized header is returned as an error
/// because the stream can no longer be resynchronized. `Ok(false)` means the
/// consumer no longer accepts arrivals.
async fn forward_frames(
    decoder: &mut FrameDecoder,
    state: &WorkerState,
) -> std::result::Result<bool, ProtocolError> {
    loop {
        match decoder.decode_next::<ServiceMessage>() {
            Ok(Some(message)) => {
                if !state.emit(TransportEvent::Message(message)).await {
                    return Ok(false);
                }
            }
            Ok(None) => return Ok(true),
            Err(ProtocolError::Serialization(e)) => {
                tracing::warn!("Discarding undecodable frame: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
}
