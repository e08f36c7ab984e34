//! TCP transport to the greenhouse server.
//!
//! One task owns the socket. Inbound frames are decoded and forwarded as
//! [`ChannelEvent`]s; outbound intents arrive over a bounded queue fed by
//! [`CommandQueue`]. The task reconnects forever with capped backoff and
//! stops once the receiving side of the event queue is gone.

use crate::config::Config;
use greenhouse_core::intent::{DispatchError, IntentSink};
use greenhouse_core::wire::{
    encode_frame, DecodeReport, HelloPayload, NdjsonFrameDecoder, SubscribePayload, WireEnvelope,
    WireMsg, DEFAULT_MAX_FRAME_BYTES, INBOUND_EVENTS,
};
use std::{io, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    net::{tcp::OwnedWriteHalf, TcpStream},
    sync::mpsc,
};
use tracing::{debug, info, warn};

pub const COMMAND_QUEUE_CAPACITY: usize = 64;
pub const EVENT_QUEUE_CAPACITY: usize = 256;
const READ_BUFFER_BYTES: usize = 8192;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Message(WireMsg),
}

/// Producer side of the outbound queue. Never blocks the UI thread.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<WireMsg>,
}

impl CommandQueue {
    pub fn new(tx: mpsc::Sender<WireMsg>) -> Self {
        Self { tx }
    }
}

impl IntentSink for CommandQueue {
    fn emit(&mut self, msg: WireMsg) -> Result<(), DispatchError> {
        self.tx.try_send(msg).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DispatchError::ChannelClosed,
        })
    }
}

pub async fn channel_loop(
    config: Config,
    tx: mpsc::Sender<ChannelEvent>,
    mut command_rx: mpsc::Receiver<WireMsg>,
) {
    let addr = config.addr();
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if tx.is_closed() {
            return;
        }
        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(event = "channel_connect_error", addr = %addr, error = %err);
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        backoff = INITIAL_BACKOFF;
        info!(event = "channel_connected", addr = %addr);

        if let Err(err) = run_session(stream, &config, &tx, &mut command_rx).await {
            warn!(event = "channel_session_error", addr = %addr, error = %err);
        }
        if tx.send(ChannelEvent::Disconnected).await.is_err() {
            return;
        }
        info!(event = "channel_disconnected", addr = %addr, retry_in_ms = backoff.as_millis() as u64);
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

async fn run_session(
    stream: TcpStream,
    config: &Config,
    tx: &mpsc::Sender<ChannelEvent>,
    command_rx: &mut mpsc::Receiver<WireMsg>,
) -> io::Result<()> {
    let (reader_half, mut writer_half) = stream.into_split();
    send_wire_envelope(&mut writer_half, &build_hello(config)).await?;
    send_wire_envelope(&mut writer_half, &build_subscribe(config)).await?;
    if tx.send(ChannelEvent::Connected).await.is_err() {
        return Ok(());
    }

    let mut reader = BufReader::new(reader_half);
    let mut decoder = NdjsonFrameDecoder::<WireEnvelope>::new(DEFAULT_MAX_FRAME_BYTES);
    let mut read_buf = [0u8; READ_BUFFER_BYTES];
    let mut command_open = true;

    loop {
        tokio::select! {
            read = reader.read(&mut read_buf) => {
                let read = read?;
                if read == 0 {
                    break;
                }
                let report = decoder.push_chunk(&read_buf[..read]);
                if !forward_frames(report, tx).await {
                    return Ok(());
                }
            }
            maybe_command = command_rx.recv(), if command_open => {
                match maybe_command {
                    Some(msg) => {
                        let kind = msg.event_name();
                        let envelope = WireEnvelope::new(&config.client_id, msg);
                        send_wire_envelope(&mut writer_half, &envelope).await?;
                        debug!(event = "intent_sent", kind);
                    }
                    None => {
                        command_open = false;
                    }
                }
            }
        }
    }

    forward_frames(decoder.finish(), tx).await;
    Ok(())
}

/// Returns false once nobody is listening for events.
async fn forward_frames(report: DecodeReport<WireEnvelope>, tx: &mpsc::Sender<ChannelEvent>) -> bool {
    for err in report.errors {
        warn!(event = "channel_decode_error", error = %err);
    }
    for envelope in report.frames {
        if !envelope.is_supported() {
            debug!(event = "channel_version_skipped", version = envelope.version.0);
            continue;
        }
        if !envelope.msg.is_inbound() {
            debug!(event = "channel_unsubscribed_skipped", kind = envelope.msg.event_name());
            continue;
        }
        if tx.send(ChannelEvent::Message(envelope.msg)).await.is_err() {
            return false;
        }
    }
    true
}

async fn send_wire_envelope(writer: &mut OwnedWriteHalf, envelope: &WireEnvelope) -> io::Result<()> {
    let frame = encode_frame(envelope, DEFAULT_MAX_FRAME_BYTES)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

fn build_hello(config: &Config) -> WireEnvelope {
    WireEnvelope::new(
        &config.client_id,
        WireMsg::Hello(HelloPayload {
            client_id: config.client_id.clone(),
            role: "dashboard".to_string(),
            capabilities: vec!["intents".to_string(), "weather".to_string()],
        }),
    )
}

fn build_subscribe(config: &Config) -> WireEnvelope {
    WireEnvelope::new(
        &config.client_id,
        WireMsg::Subscribe(SubscribePayload {
            topics: INBOUND_EVENTS.iter().map(|topic| topic.to_string()).collect(),
        }),
    )
}

fn next_backoff(current: Duration) -> Duration {
    (current + current).min(MAX_BACKOFF)
}
