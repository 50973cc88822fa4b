//! The generic STOMP client: connection handshake, receipt-correlated
//! verbs, transaction registry, and the pending-message buffer.
//!
//! A [`Connection`] is not internally synchronized. The caller must keep at
//! most one operation outstanding at a time; overlapping calls would
//! interleave frames on the wire and corrupt receipt correlation.

use std::collections::{BTreeSet, VecDeque};

use bytes::{Buf, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, trace};

use crate::errors::StompError;
use crate::frame::{self, ClientFrame, ServerFrame};
use crate::{Message, Result};

/// Frame codec, parameterized by the peer's terminator convention.
///
/// Writing always uses `\0\n`, which both conventions accept. Reading
/// consumes a trailing line after the `\0` only when `eof_nl` is set.
#[derive(Debug)]
pub(crate) struct ClientCodec {
    eof_nl: bool,
}

impl Decoder for ClientCodec {
    type Item = ServerFrame;
    type Error = StompError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ServerFrame>> {
        let (item, offset) = match frame::parse_frame(src, self.eof_nl) {
            Ok((remain, frame)) => (
                frame.to_server_frame(),
                remain.as_ptr() as usize - src.as_ptr() as usize,
            ),
            Err(nom::Err::Incomplete(_)) => return Ok(None),
            Err(e) => {
                return Err(StompError::protocol(
                    "decoding frame",
                    format!("unparseable input: {e:?}"),
                ))
            }
        };
        src.advance(offset);
        Ok(Some(item))
    }
}

impl Encoder<ClientFrame> for ClientCodec {
    type Error = StompError;

    fn encode(&mut self, item: ClientFrame, dst: &mut BytesMut) -> Result<()> {
        item.serialize(dst);
        Ok(())
    }
}

/// Options for [`Connection::connect`].
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Terminator convention of the peer: `true` consumes `\0\n` after each
    /// frame (ActiveMQ-style brokers), `false` a bare `\0` (RabbitMQ).
    pub eof_nl: bool,
    /// Extra headers appended to the CONNECT frame.
    pub headers: Vec<(String, String)>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        ConnectConfig {
            login: None,
            passcode: None,
            eof_nl: true,
            headers: Vec::new(),
        }
    }
}

impl ConnectConfig {
    pub fn with_credentials(login: Option<&str>, passcode: Option<&str>) -> Self {
        ConnectConfig {
            login: login.map(str::to_string),
            passcode: passcode.map(str::to_string),
            ..ConnectConfig::default()
        }
    }
}

/// A STOMP connection over an arbitrary byte stream.
#[derive(Debug)]
pub struct Connection<S> {
    transport: Framed<S, ClientCodec>,
    closed: bool,
    transactions: BTreeSet<String>,
    pending: VecDeque<Message>,
    receipt_seq: u64,
    transaction_seq: u64,
}

impl Connection<TcpStream> {
    /// Connect to a STOMP server via TCP and perform the handshake.
    pub async fn connect(
        address: impl ToSocketAddrs,
        config: ConnectConfig,
    ) -> Result<Connection<TcpStream>> {
        let tcp = TcpStream::connect(address).await?;
        Connection::connect_stream(tcp, config).await
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the STOMP handshake over an already-established stream.
    pub async fn connect_stream(stream: S, config: ConnectConfig) -> Result<Connection<S>> {
        let transport = ClientCodec {
            eof_nl: config.eof_nl,
        }
        .framed(stream);
        let mut conn = Connection {
            transport,
            closed: false,
            transactions: BTreeSet::new(),
            pending: VecDeque::new(),
            receipt_seq: 1,
            transaction_seq: 1,
        };
        conn.handshake(config).await?;
        Ok(conn)
    }

    async fn handshake(&mut self, config: ConnectConfig) -> Result<()> {
        const CTX: &str = "completing STOMP handshake";
        let mut headers = Vec::with_capacity(config.headers.len() + 2);
        if config.login.is_some() || config.passcode.is_some() {
            headers.push(("login".to_string(), config.login.unwrap_or_default()));
            headers.push(("passcode".to_string(), config.passcode.unwrap_or_default()));
        }
        headers.extend(config.headers);
        self.write_frame(ClientFrame {
            command: "CONNECT",
            headers,
            body: None,
        })
        .await?;
        match self.read_non_message(CTX).await? {
            ServerFrame::Connected { .. } => {
                debug!("connected");
                Ok(())
            }
            ServerFrame::Error {
                message: Some(m), ..
            } if m == "access_refused" => Err(StompError::access_refused(CTX)),
            other => Err(StompError::protocol(CTX, other.describe())),
        }
    }

    /// Send a DISCONNECT frame and close the stream. Idempotent; transport
    /// errors are swallowed since the intent is to tear down.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("disconnecting");
        let frame = ClientFrame {
            command: "DISCONNECT",
            headers: Vec::new(),
            body: None,
        };
        if let Err(e) = self.transport.send(frame).await {
            if !e.is_connection_error() {
                return Err(e);
            }
        }
        let _ = self.transport.get_mut().shutdown().await;
        Ok(())
    }

    /// Send `body` to `destination`, confirmed by a server receipt unless a
    /// transaction is given (the broker only commits at COMMIT, so a receipt
    /// on intermediate sends would be wasted).
    ///
    /// Adds `content-length` and `persistent: true`; a caller-supplied
    /// `persistent` header wins.
    pub async fn send(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.send_body(destination, headers, body, transaction, true)
            .await
    }

    /// Like [`send`](Connection::send) but fire-and-forget: no receipt is
    /// requested and the message is marked `persistent: false`.
    pub async fn send_no_ack(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.send_body(destination, headers, body, transaction, false)
            .await
    }

    async fn send_body(
        &mut self,
        destination: &str,
        extra: &[(String, String)],
        body: &[u8],
        transaction: Option<&str>,
        reliable: bool,
    ) -> Result<()> {
        const CTX: &str = "sending message";
        let mut headers = Vec::with_capacity(extra.len() + 4);
        headers.push(("content-length".to_string(), body.len().to_string()));
        headers.push(("destination".to_string(), destination.to_string()));
        if !extra.iter().any(|(name, _)| name == "persistent") {
            let persistent = if reliable { "true" } else { "false" };
            headers.push(("persistent".to_string(), persistent.to_string()));
        }
        headers.extend(extra.iter().cloned());
        if let Some(tx) = transaction {
            headers.push(("transaction".to_string(), tx.to_string()));
        }
        if reliable && transaction.is_none() {
            self.send_with_receipt("SEND", headers, Some(body.to_vec()), CTX)
                .await?;
        } else {
            self.check_open(CTX)?;
            self.write_frame(ClientFrame {
                command: "SEND",
                headers,
                body: Some(body.to_vec()),
            })
            .await?;
        }
        Ok(())
    }

    /// SUBSCRIBE to a destination, confirmed by receipt.
    pub async fn subscribe(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
    ) -> Result<()> {
        let mut hs = vec![("destination".to_string(), destination.to_string())];
        hs.extend(headers.iter().cloned());
        self.send_with_receipt("SUBSCRIBE", hs, None, "subscribing")
            .await
            .map(drop)
    }

    /// UNSUBSCRIBE from a destination, confirmed by receipt.
    pub async fn unsubscribe(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
    ) -> Result<()> {
        let mut hs = vec![("destination".to_string(), destination.to_string())];
        hs.extend(headers.iter().cloned());
        self.send_with_receipt("UNSUBSCRIBE", hs, None, "unsubscribing")
            .await
            .map(drop)
    }

    /// Acknowledge a received message, confirmed by receipt.
    pub async fn ack_msg(&mut self, message: &Message, transaction: Option<&str>) -> Result<()> {
        let mut headers = vec![("message-id".to_string(), message.id.clone())];
        if let Some(tx) = transaction {
            headers.push(("transaction".to_string(), tx.to_string()));
        }
        self.send_with_receipt("ACK", headers, None, "acking message")
            .await
            .map(drop)
    }

    /// Return the next message: from the pending buffer if one was read
    /// while waiting for a receipt, otherwise from the wire. Non-MESSAGE
    /// frames encountered here are discarded.
    pub async fn receive_msg(&mut self) -> Result<Message> {
        const CTX: &str = "receiving message";
        self.check_open(CTX)?;
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }
        loop {
            match self.read_frame(CTX).await? {
                ServerFrame::Message {
                    message_id: Some(id),
                    headers,
                    body,
                } => {
                    return Ok(Message {
                        id,
                        headers,
                        body,
                    })
                }
                frame @ ServerFrame::Message {
                    message_id: None, ..
                } => return Err(StompError::protocol_retry(CTX, frame.describe())),
                other => {
                    debug!(frame = %other.describe(), "discarding frame while waiting for MESSAGE");
                }
            }
        }
    }

    /// BEGIN a transaction and return its id.
    pub async fn transaction_begin(&mut self) -> Result<String> {
        self.transaction_seq += 1;
        let id = format!("transaction-{}", self.transaction_seq);
        let headers = vec![("transaction".to_string(), id.clone())];
        self.send_with_receipt("BEGIN", headers, None, "beginning transaction")
            .await?;
        self.transactions.insert(id.clone());
        Ok(id)
    }

    /// COMMIT a transaction previously returned by
    /// [`transaction_begin`](Connection::transaction_begin).
    pub async fn transaction_commit(&mut self, transaction: &str) -> Result<()> {
        let headers = vec![("transaction".to_string(), transaction.to_string())];
        self.send_with_receipt("COMMIT", headers, None, "committing transaction")
            .await?;
        self.transactions.remove(transaction);
        Ok(())
    }

    /// ABORT a transaction previously returned by
    /// [`transaction_begin`](Connection::transaction_begin).
    pub async fn transaction_abort(&mut self, transaction: &str) -> Result<()> {
        let headers = vec![("transaction".to_string(), transaction.to_string())];
        self.send_with_receipt("ABORT", headers, None, "aborting transaction")
            .await?;
        self.transactions.remove(transaction);
        Ok(())
    }

    /// Commit every live transaction, smallest id first.
    pub async fn transaction_commit_all(&mut self) -> Result<()> {
        while let Some(id) = self.transactions.iter().next().cloned() {
            self.transaction_commit(&id).await?;
        }
        Ok(())
    }

    /// Abort every live transaction, smallest id first.
    pub async fn transaction_abort_all(&mut self) -> Result<()> {
        while let Some(id) = self.transactions.iter().next().cloned() {
            self.transaction_abort(&id).await?;
        }
        Ok(())
    }

    /// Ids of transactions that have a completed BEGIN and no completed
    /// COMMIT/ABORT yet.
    pub fn transactions(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Write a frame with a fresh `receipt` header prepended and wait for
    /// the matching RECEIPT, buffering MESSAGE frames that arrive in the
    /// meantime. Returns the RECEIPT's headers.
    pub(crate) async fn send_with_receipt(
        &mut self,
        command: &'static str,
        mut headers: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        context: &'static str,
    ) -> Result<Vec<(String, String)>> {
        self.check_open(context)?;
        self.receipt_seq += 1;
        let receipt_id = format!("receipt-{}", self.receipt_seq);
        headers.insert(0, ("receipt".to_string(), receipt_id.clone()));
        self.write_frame(ClientFrame {
            command,
            headers,
            body,
        })
        .await?;
        match self.read_non_message(context).await? {
            ServerFrame::Receipt {
                receipt_id: Some(id),
                headers,
            } if id == receipt_id => Ok(headers),
            other => Err(StompError::protocol(context, other.describe())),
        }
    }

    fn check_open(&self, context: &str) -> Result<()> {
        if self.closed {
            Err(StompError::closed(context))
        } else {
            Ok(())
        }
    }

    async fn write_frame(&mut self, frame: ClientFrame) -> Result<()> {
        trace!(command = frame.command, "writing frame");
        if self.transport.send(frame).await.is_err() {
            self.closed = true;
            return Err(StompError::closed("writing frame"));
        }
        Ok(())
    }

    /// Read frames until one that is not a MESSAGE arrives. Well-formed
    /// MESSAGE frames are buffered in arrival order; MESSAGE frames without
    /// a message-id are dropped.
    async fn read_non_message(&mut self, context: &str) -> Result<ServerFrame> {
        loop {
            match self.read_frame(context).await? {
                ServerFrame::Message {
                    message_id: Some(id),
                    headers,
                    body,
                } => {
                    self.pending.push_back(Message {
                        id,
                        headers,
                        body,
                    });
                }
                ServerFrame::Message {
                    message_id: None, ..
                } => {
                    debug!("dropping MESSAGE frame without message-id");
                }
                other => return Ok(other),
            }
        }
    }

    async fn read_frame(&mut self, context: &str) -> Result<ServerFrame> {
        match self.transport.next().await {
            Some(Ok(frame)) => {
                trace!(frame = %frame.describe(), "read frame");
                Ok(frame)
            }
            Some(Err(e)) => {
                self.closed = true;
                Err(e)
            }
            None => {
                self.closed = true;
                Err(StompError::closed(context))
            }
        }
    }
}
