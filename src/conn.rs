//! The multiplexed client connection.
//!
//! A [`ClientConn`] owns one stream socket and runs exactly one reader task.
//! All writes are serialized by an async mutex that is held across each
//! write → wait-for-response pair, so at most one exchange is outstanding per
//! connection. The reader stamps every response-class packet with a monotonic
//! sequence number; a waiting caller accepts the first response whose stamp
//! matches its own write sequence and discards earlier stamps left behind by
//! callers that abandoned their wait.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::{Duration, SystemTime},
};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{Error, ErrorCode, Result},
    message::Message,
    packet::{Packet, MAX_SEGMENT_LEN},
    PacketType,
};

/// Frame header length: a u32 segment length in network order.
const HEADER_LEN: usize = 4;

/// Capacity of the internal response queue. The reader never blocks on it;
/// overflow drops the packet.
const RESPONSE_QUEUE_LEN: usize = 64;

/// Capacity of the channel backing a streaming call.
const STREAM_QUEUE_LEN: usize = 16;

/// How long the rest of a frame may take to arrive once its header has been
/// read. A stalled half-delivered frame stops the reader instead of parking
/// it forever.
const READ_DEADLINE: Duration = Duration::from_secs(5);

/// A bidirectional byte stream the connection can run on.
pub trait Socket: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Socket for T {}

/// An event received from the daemon.
#[derive(Clone, Debug)]
pub struct Event {
    /// The event type name as registered with the daemon, such as
    /// "ike-updown" or "log".
    pub name: String,

    /// The message associated with this event.
    pub message: Message,

    /// When the client received the event.
    pub timestamp: SystemTime,
}

enum Dispatch {
    Response { seq: u64, pkt: Packet },
    Event(Event),
}

pub(crate) struct ClientConn {
    write: Arc<Mutex<WriteState>>,
    shared: Arc<StdMutex<Shared>>,
    token: CancellationToken,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

struct WriteState {
    half: WriteHalf<Box<dyn Socket>>,
    write_seq: u64,
    resp_rx: mpsc::Receiver<Dispatch>,
}

#[derive(Default)]
struct Shared {
    notify: Vec<mpsc::Sender<Event>>,
    registered: Vec<String>,
    stream_event: Option<String>,
    stopped: bool,
}

impl ClientConn {
    /// Takes ownership of the socket and starts the reader task. Must be
    /// called from within a tokio runtime.
    pub fn new(socket: Box<dyn Socket>) -> Self {
        let (read_half, write_half) = tokio::io::split(socket);
        let (resp_tx, resp_rx) = mpsc::channel(RESPONSE_QUEUE_LEN);

        let shared = Arc::new(StdMutex::new(Shared::default()));
        let token = CancellationToken::new();
        let reader = tokio::spawn(reader_loop(read_half, resp_tx, shared.clone(), token.clone()));

        Self {
            write: Arc::new(Mutex::new(WriteState {
                half: write_half,
                write_seq: 0,
                resp_rx,
            })),
            shared,
            token,
            reader: StdMutex::new(Some(reader)),
        }
    }

    /// Sends a command request and returns the decoded response message. A
    /// `success = "no"` response surfaces as a command-failed error carrying
    /// the server's `errmsg`.
    pub async fn call(&self, cmd: &str, body: Bytes) -> Result<Message> {
        let pkt = Packet::new(PacketType::CmdRequest, Some(cmd.to_string()), body);
        let frame = pkt.encode()?;

        let mut write = self.write.lock().await;
        let resp = exchange(&mut write, &self.shared, frame).await?;
        drop(write);

        match resp.ptype {
            PacketType::CmdResponse => {
                let msg: Message = crate::from_slice(&resp.body)?;
                msg.check()?;
                Ok(msg)
            },
            PacketType::CmdUnknown => Err(Error::new(ErrorCode::UnknownCommand(cmd.to_string()))),
            t => Err(Error::new(ErrorCode::UnexpectedResponse(t as u8))),
        }
    }

    /// Starts a streamed command: registers `event`, sends the command
    /// request, and forwards every matching event into the returned channel,
    /// terminated by the command response message. The event is always
    /// unregistered when the exchange finishes, even if the receiver is
    /// dropped early.
    pub fn call_streaming(&self, cmd: &str, event: &str, body: Bytes) -> mpsc::Receiver<Result<Message>> {
        let (tx, rx) = mpsc::channel(STREAM_QUEUE_LEN);

        let write = self.write.clone();
        let shared = self.shared.clone();
        let cmd = cmd.to_string();
        let event = event.to_string();

        tokio::spawn(async move {
            let mut write = write.lock().await;
            if let Err(e) = stream_exchange(&mut write, &shared, &cmd, &event, body, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    /// Registers for the given events, skipping names that are already
    /// registered on this connection. An event the daemon does not know
    /// produces an unknown-event error and does not join the list.
    pub async fn subscribe(&self, events: &[&str]) -> Result<()> {
        for event in events {
            if self.shared.lock().unwrap().registered.iter().any(|e| e == event) {
                continue;
            }

            self.register_event(event, true).await?;
            self.shared.lock().unwrap().registered.push(event.to_string());
        }

        Ok(())
    }

    /// Unregisters the given events, skipping names that are not registered
    /// on this connection.
    pub async fn unsubscribe(&self, events: &[&str]) -> Result<()> {
        for event in events {
            if !self.shared.lock().unwrap().registered.iter().any(|e| e == event) {
                continue;
            }

            self.register_event(event, false).await?;
            self.shared.lock().unwrap().registered.retain(|e| e != event);
        }

        Ok(())
    }

    /// Unregisters every event currently registered on this connection.
    pub async fn unsubscribe_all(&self) -> Result<()> {
        let registered = self.shared.lock().unwrap().registered.clone();
        let events: Vec<&str> = registered.iter().map(String::as_str).collect();

        self.unsubscribe(&events).await
    }

    /// Adds an external event observer. Dispatch to the channel is
    /// non-blocking; when the channel is full the event is dropped for that
    /// channel. All registered channels close when the connection stops.
    pub fn notify(&self, channel: mpsc::Sender<Event>) {
        self.shared.lock().unwrap().notify.push(channel);
    }

    /// Removes a previously added event observer.
    pub fn unnotify(&self, channel: &mpsc::Sender<Event>) {
        self.shared.lock().unwrap().notify.retain(|c| !c.same_channel(channel));
    }

    /// Stops the reader task and waits for it to finish. Pending exchanges
    /// fail with a closed-connection error and notify channels close.
    pub async fn close(&self) {
        self.token.cancel();

        let reader = self.reader.lock().unwrap().take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }
    }

    async fn register_event(&self, event: &str, register: bool) -> Result<()> {
        let ptype = if register {
            PacketType::EventRegister
        } else {
            PacketType::EventUnregister
        };
        let frame = Packet::new(ptype, Some(event.to_string()), Bytes::new()).encode()?;

        let mut write = self.write.lock().await;
        let resp = exchange(&mut write, &self.shared, frame).await?;
        drop(write);

        check_event_ack(resp.ptype, event)
    }
}

impl Drop for ClientConn {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn check_event_ack(ptype: PacketType, event: &str) -> Result<()> {
    match ptype {
        PacketType::EventConfirm => Ok(()),
        PacketType::EventUnknown => Err(Error::new(ErrorCode::UnknownEvent(event.to_string()))),
        t => Err(Error::new(ErrorCode::UnexpectedResponse(t as u8))),
    }
}

/// Writes one frame and waits for the response stamped with the matching
/// sequence number. Responses stamped for abandoned waits are discarded;
/// event packets in the queue are skipped.
async fn exchange(write: &mut WriteState, shared: &StdMutex<Shared>, frame: Bytes) -> Result<Packet> {
    if shared.lock().unwrap().stopped {
        return Err(Error::new(ErrorCode::ConnectionClosed));
    }

    write_frame(&mut write.half, &frame).await?;
    write.write_seq += 1;
    let seq = write.write_seq;

    await_response(write, seq).await
}

async fn await_response(write: &mut WriteState, seq: u64) -> Result<Packet> {
    loop {
        match write.resp_rx.recv().await {
            None => return Err(Error::new(ErrorCode::ConnectionClosed)),
            Some(Dispatch::Event(_)) => continue,
            Some(Dispatch::Response { seq: s, pkt }) if s == seq => return Ok(pkt),
            Some(Dispatch::Response { seq: s, .. }) if s < seq => continue,
            Some(Dispatch::Response { pkt, .. }) => {
                return Err(Error::new(ErrorCode::UnexpectedResponse(pkt.ptype as u8)));
            },
        }
    }
}

/// Runs one streamed command while the write lock is held: register, send
/// the request, forward matching events, stop on the command response, and
/// unregister no matter how the exchange went.
async fn stream_exchange(
    write: &mut WriteState,
    shared: &StdMutex<Shared>,
    cmd: &str,
    event: &str,
    body: Bytes,
    tx: &mpsc::Sender<Result<Message>>,
) -> Result<()> {
    if shared.lock().unwrap().stopped {
        return Err(Error::new(ErrorCode::ConnectionClosed));
    }

    let frame = Packet::new(PacketType::EventRegister, Some(event.to_string()), Bytes::new()).encode()?;
    let resp = exchange(write, shared, frame).await?;
    check_event_ack(resp.ptype, event)?;

    shared.lock().unwrap().stream_event = Some(event.to_string());

    let result = stream_request(write, shared, cmd, body, tx).await;

    shared.lock().unwrap().stream_event = None;

    let frame = Packet::new(PacketType::EventUnregister, Some(event.to_string()), Bytes::new()).encode()?;
    let unregister = match exchange(write, shared, frame).await {
        Ok(resp) => check_event_ack(resp.ptype, event),
        Err(e) => Err(e),
    };

    match result {
        Err(e) => Err(e),
        Ok(()) => unregister,
    }
}

async fn stream_request(
    write: &mut WriteState,
    shared: &StdMutex<Shared>,
    cmd: &str,
    body: Bytes,
    tx: &mpsc::Sender<Result<Message>>,
) -> Result<()> {
    let frame = Packet::new(PacketType::CmdRequest, Some(cmd.to_string()), body).encode()?;
    if shared.lock().unwrap().stopped {
        return Err(Error::new(ErrorCode::ConnectionClosed));
    }

    write_frame(&mut write.half, &frame).await?;
    write.write_seq += 1;
    let seq = write.write_seq;

    loop {
        match write.resp_rx.recv().await {
            None => return Err(Error::new(ErrorCode::ConnectionClosed)),
            Some(Dispatch::Event(event)) => {
                // The receiver may be gone; keep draining so the exchange
                // still runs to its command response.
                let _ = tx.send(Ok(event.message)).await;
            },
            Some(Dispatch::Response { seq: s, pkt }) if s == seq => {
                return match pkt.ptype {
                    PacketType::CmdResponse => {
                        let msg: Message = crate::from_slice(&pkt.body)?;
                        let item = msg.check().map(|()| msg);
                        let _ = tx.send(item).await;
                        Ok(())
                    },
                    PacketType::CmdUnknown => Err(Error::new(ErrorCode::UnknownCommand(cmd.to_string()))),
                    t => Err(Error::new(ErrorCode::UnexpectedResponse(t as u8))),
                };
            },
            Some(Dispatch::Response { seq: s, .. }) if s < seq => continue,
            Some(Dispatch::Response { pkt, .. }) => {
                return Err(Error::new(ErrorCode::UnexpectedResponse(pkt.ptype as u8)));
            },
        }
    }
}

async fn reader_loop(
    mut half: ReadHalf<Box<dyn Socket>>,
    resp_tx: mpsc::Sender<Dispatch>,
    shared: Arc<StdMutex<Shared>>,
    token: CancellationToken,
) {
    debug!("reader started");

    let mut read_seq: u64 = 0;

    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            frame = read_frame(&mut half) => match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!("connection closed by peer");
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "reader stopped on read error");
                    break;
                },
            },
        };

        let pkt = match Packet::parse(frame.freeze()) {
            Ok(pkt) => pkt,
            Err(e) => {
                warn!(error = %e, "reader stopped on malformed packet");
                break;
            },
        };

        match pkt.ptype {
            PacketType::Event => {
                let name = pkt.name.clone().unwrap_or_default();
                let message = match crate::from_slice::<Message>(&pkt.body) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(event = %name, error = %e, "reader stopped on malformed event");
                        break;
                    },
                };

                let event = Event {
                    name,
                    message,
                    timestamp: SystemTime::now(),
                };

                let streaming = {
                    let shared = shared.lock().unwrap();
                    if shared.registered.iter().any(|e| e == &event.name) {
                        for channel in &shared.notify {
                            // Non-blocking: a full or abandoned channel drops
                            // the event, the reader moves on.
                            let _ = channel.try_send(event.clone());
                        }
                    }

                    shared.stream_event.as_deref() == Some(event.name.as_str())
                };

                if streaming {
                    let _ = resp_tx.try_send(Dispatch::Event(event));
                }
            },
            PacketType::CmdResponse | PacketType::CmdUnknown | PacketType::EventConfirm | PacketType::EventUnknown => {
                read_seq += 1;
                if resp_tx.try_send(Dispatch::Response { seq: read_seq, pkt }).is_err() {
                    warn!(seq = read_seq, "response queue full, dropping packet");
                }
            },
            PacketType::CmdRequest | PacketType::EventRegister | PacketType::EventUnregister => {
                warn!(ptype = ?pkt.ptype, "dropping server-bound packet");
            },
        }
    }

    {
        let mut shared = shared.lock().unwrap();
        shared.stopped = true;
        shared.stream_event = None;
        // Dropping the senders closes every notify channel exactly once.
        shared.notify.clear();
    }

    debug!("reader stopped");
}

/// Reads one framed segment. Returns `None` on a clean EOF at a frame
/// boundary. The declared length is validated against the protocol ceiling
/// before any allocation, and the body must arrive within the read deadline.
async fn read_frame(half: &mut ReadHalf<Box<dyn Socket>>) -> Result<Option<BytesMut>> {
    let mut header = [0u8; HEADER_LEN];
    match half.read_exact(&mut header).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_SEGMENT_LEN {
        return Err(Error::new(ErrorCode::SegmentTooLarge(len)));
    }

    let mut body = BytesMut::zeroed(len);
    match timeout(READ_DEADLINE, half.read_exact(&mut body[..])).await {
        Ok(Ok(_)) => Ok(Some(body)),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(Error::new(ErrorCode::DeadlineExceeded)),
    }
}

async fn write_frame(half: &mut WriteHalf<Box<dyn Socket>>, frame: &[u8]) -> Result<()> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + frame.len());
    buf.put_u32(frame.len() as u32);
    buf.put_slice(frame);

    half.write_all(&buf).await?;
    Ok(())
}
