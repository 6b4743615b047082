//! A VICI client session.
//!
//! [`Session`] is the public face of the crate: it owns one multiplexed
//! connection to the daemon and exposes command calls, streamed command
//! calls, and event subscriptions. Any number of tasks may share a session;
//! exchanges are serialized on the connection in the order callers reach it,
//! and responses are matched back to their callers by sequence number.
//!
//! Cancellation is the Rust-native kind: every returned future can be
//! dropped, and callers that want deadlines wrap a call in
//! [`tokio::time::timeout`]. A cancelled wait leaves the connection usable;
//! its late response is discarded by the next caller.

use std::{
    path::{Path, PathBuf},
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use serde::Serialize;
use tokio::{
    net::{TcpStream, UnixStream},
    sync::mpsc,
};
use tokio_stream::wrappers::ReceiverStream;

pub use crate::conn::{Event, Socket};
use crate::{conn::ClientConn, error::Result, message::Message};

/// Default path of the daemon's control socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/charon.vici";

/// A client session with an IKE daemon.
///
/// # Example
///
/// ```no_run
/// use vici::Session;
///
/// # async fn run() -> Result<(), vici::Error> {
/// let session = Session::connect().await?;
/// let version = session.call("version", &()).await?;
/// println!("{}", version);
/// session.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    conn: ClientConn,
}

impl Session {
    /// Connects to the daemon at the default socket path,
    /// `/var/run/charon.vici`.
    pub async fn connect() -> Result<Self> {
        Self::builder().connect().await
    }

    /// Returns a builder for configuring the endpoint to connect to.
    pub fn builder() -> SessionBuilder {
        SessionBuilder {
            endpoint: Endpoint::Unix(PathBuf::from(DEFAULT_SOCKET_PATH)),
        }
    }

    /// Runs a session over a pre-connected stream. This is how custom
    /// transports are plugged in, and how tests drive a session over an
    /// in-memory pipe.
    pub fn with_socket<S>(socket: S) -> Self
    where
        S: Socket + 'static,
    {
        Self {
            conn: ClientConn::new(Box::new(socket)),
        }
    }

    /// Sends a command request and returns the daemon's response message.
    ///
    /// The payload may be any serializable map or struct, a [`Message`], or
    /// `&()` for commands without arguments. A response carrying
    /// `success = "no"` surfaces as a command-failed error wrapping the
    /// server's `errmsg`; a command the daemon does not know surfaces as an
    /// unknown-command error.
    pub async fn call<P>(&self, cmd: &str, payload: &P) -> Result<Message>
    where
        P: Serialize + ?Sized,
    {
        let body = Bytes::from(crate::to_vec(payload)?);
        self.conn.call(cmd, body).await
    }

    /// Sends a streamed command request and returns the stream of messages
    /// it produces.
    ///
    /// The daemon emits zero or more `event`-typed event packets while the
    /// command is active; each becomes one stream item, and the terminal
    /// command response becomes the final item. The event registration is
    /// always undone when the stream finishes, including when the stream is
    /// dropped before its end.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tokio_stream::StreamExt;
    /// use vici::Session;
    ///
    /// # async fn run() -> Result<(), vici::Error> {
    /// let session = Session::connect().await?;
    ///
    /// let mut sas = session.call_streaming("list-sas", "list-sa", &())?;
    /// while let Some(sa) = sas.next().await {
    ///     println!("{}", sa?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn call_streaming<P>(&self, cmd: &str, event: &str, payload: &P) -> Result<EventStream>
    where
        P: Serialize + ?Sized,
    {
        let body = Bytes::from(crate::to_vec(payload)?);
        let rx = self.conn.call_streaming(cmd, event, body);

        Ok(EventStream {
            inner: ReceiverStream::new(rx),
        })
    }

    /// Registers this session for the given event types. Events arrive on
    /// channels added with [`Session::notify`]. Already-registered names are
    /// skipped; an event name the daemon does not know produces an
    /// unknown-event error and is not registered.
    pub async fn subscribe(&self, events: &[&str]) -> Result<()> {
        self.conn.subscribe(events).await
    }

    /// Unregisters the given event types.
    pub async fn unsubscribe(&self, events: &[&str]) -> Result<()> {
        self.conn.unsubscribe(events).await
    }

    /// Unregisters every event type this session is registered for.
    pub async fn unsubscribe_all(&self) -> Result<()> {
        self.conn.unsubscribe_all().await
    }

    /// Adds a channel to deliver subscribed events to.
    ///
    /// Delivery is non-blocking: if the channel is full the event is dropped
    /// for that channel, so size the buffer for the expected event rate. The
    /// channel closes when the session does.
    pub fn notify(&self, channel: mpsc::Sender<Event>) {
        self.conn.notify(channel);
    }

    /// Removes a channel previously added with [`Session::notify`].
    pub fn unnotify(&self, channel: &mpsc::Sender<Event>) {
        self.conn.unnotify(channel);
    }

    /// Closes the session. The reader stops, pending calls fail with a
    /// closed-connection error, and all notify channels are closed.
    pub async fn close(&self) {
        self.conn.close().await;
    }
}

/// The messages produced by a streamed command call.
///
/// A finite stream: every matching event message, then the terminal command
/// response. Dropping it early aborts delivery but not the exchange; the
/// connection finishes the protocol in the background.
pub struct EventStream {
    inner: ReceiverStream<Result<Message>>,
}

impl tokio_stream::Stream for EventStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Configures the endpoint a [`Session`] connects to.
///
/// ```no_run
/// # async fn run() -> Result<(), vici::Error> {
/// let session = vici::Session::builder()
///     .socket_path("/run/charon.vici")
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    endpoint: Endpoint,
}

enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl SessionBuilder {
    /// Connects to a UNIX domain socket at `path` instead of the default
    /// `/var/run/charon.vici`.
    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.endpoint = Endpoint::Unix(path.as_ref().to_path_buf());
        self
    }

    /// Connects to a TCP endpoint, for daemons exposing the protocol on a
    /// loopback address and port.
    pub fn tcp(mut self, addr: impl Into<String>) -> Self {
        self.endpoint = Endpoint::Tcp(addr.into());
        self
    }

    /// Establishes the connection and starts the session.
    pub async fn connect(self) -> Result<Session> {
        let socket: Box<dyn Socket> = match self.endpoint {
            Endpoint::Unix(path) => Box::new(UnixStream::connect(path).await?),
            Endpoint::Tcp(addr) => Box::new(TcpStream::connect(addr).await?),
        };

        Ok(Session {
            conn: ClientConn::new(socket),
        })
    }
}
