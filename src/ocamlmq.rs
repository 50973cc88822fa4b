//! ocamlmq dialect.
//!
//! Extends the ActiveMQ-style baseline with a queue-size control query and
//! a per-message ack timeout. Queue names are given bare; the `/queue/`
//! prefix is added here.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::client::{ConnectConfig, Connection};
use crate::{Message, Result};

/// Client for an ocamlmq broker.
pub struct OcamlMq<S> {
    conn: Connection<S>,
}

impl OcamlMq<TcpStream> {
    pub async fn connect(
        address: impl ToSocketAddrs,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let config = ConnectConfig::with_credentials(login, passcode);
        Ok(OcamlMq {
            conn: Connection::connect(address, config).await?,
        })
    }
}

impl<S> OcamlMq<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn connect_stream(
        stream: S,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let config = ConnectConfig::with_credentials(login, passcode);
        Ok(OcamlMq {
            conn: Connection::connect_stream(stream, config).await?,
        })
    }

    /// Send to a queue. `ack_timeout` (seconds) asks the broker to redeliver
    /// if no ACK arrives in time; it is a server-side semantic, not a
    /// client-side timeout.
    pub async fn send(
        &mut self,
        queue: &str,
        body: &[u8],
        ack_timeout: Option<f64>,
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send(
                &queue_destination(queue),
                &ack_timeout_headers(ack_timeout),
                body,
                transaction,
            )
            .await
    }

    pub async fn send_no_ack(
        &mut self,
        queue: &str,
        body: &[u8],
        ack_timeout: Option<f64>,
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send_no_ack(
                &queue_destination(queue),
                &ack_timeout_headers(ack_timeout),
                body,
                transaction,
            )
            .await
    }

    pub async fn subscribe(&mut self, queue: &str) -> Result<()> {
        self.conn.subscribe(&queue_destination(queue), &[]).await
    }

    pub async fn unsubscribe(&mut self, queue: &str) -> Result<()> {
        self.conn.unsubscribe(&queue_destination(queue), &[]).await
    }

    /// Number of messages stored in `queue`, per the broker's
    /// `/control/count-msgs/` query. `None` when the broker does not answer
    /// with a numeric `num-messages` header.
    pub async fn queue_size(&mut self, queue: &str) -> Result<Option<i64>> {
        let headers = vec![(
            "destination".to_string(),
            format!("/control/count-msgs/{queue}"),
        )];
        let receipt = self
            .conn
            .send_with_receipt("SEND", headers, None, "querying queue size")
            .await?;
        Ok(receipt
            .iter()
            .find(|(name, _)| name == "num-messages")
            .and_then(|(_, value)| value.parse().ok()))
    }

    pub async fn receive_msg(&mut self) -> Result<Message> {
        self.conn.receive_msg().await
    }

    pub async fn ack_msg(&mut self, message: &Message, transaction: Option<&str>) -> Result<()> {
        self.conn.ack_msg(message, transaction).await
    }

    pub async fn transaction_begin(&mut self) -> Result<String> {
        self.conn.transaction_begin().await
    }

    pub async fn transaction_commit(&mut self, transaction: &str) -> Result<()> {
        self.conn.transaction_commit(transaction).await
    }

    pub async fn transaction_abort(&mut self, transaction: &str) -> Result<()> {
        self.conn.transaction_abort(transaction).await
    }

    pub async fn transaction_commit_all(&mut self) -> Result<()> {
        self.conn.transaction_commit_all().await
    }

    pub async fn transaction_abort_all(&mut self) -> Result<()> {
        self.conn.transaction_abort_all().await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.conn.disconnect().await
    }
}

fn queue_destination(queue: &str) -> String {
    format!("/queue/{queue}")
}

fn ack_timeout_headers(ack_timeout: Option<f64>) -> Vec<(String, String)> {
    ack_timeout
        .map(|t| vec![("ack-timeout".to_string(), t.to_string())])
        .unwrap_or_default()
}
