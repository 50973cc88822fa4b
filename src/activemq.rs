//! ActiveMQ-style baseline dialect.
//!
//! A thin layer over the generic client: frames use the `\0\n` terminator,
//! and destinations are passed through verbatim - callers include the
//! `/queue/` or `/topic/` prefix themselves.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::client::{ConnectConfig, Connection};
use crate::{Message, Result};

/// Client for ActiveMQ-compatible brokers.
pub struct ActiveMq<S> {
    conn: Connection<S>,
}

impl ActiveMq<TcpStream> {
    pub async fn connect(
        address: impl ToSocketAddrs,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let config = ConnectConfig::with_credentials(login, passcode);
        Ok(ActiveMq {
            conn: Connection::connect(address, config).await?,
        })
    }
}

impl<S> ActiveMq<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub async fn connect_stream(
        stream: S,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let config = ConnectConfig::with_credentials(login, passcode);
        Ok(ActiveMq {
            conn: Connection::connect_stream(stream, config).await?,
        })
    }

    pub async fn send(
        &mut self,
        destination: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn.send(destination, &[], body, transaction).await
    }

    pub async fn send_no_ack(
        &mut self,
        destination: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send_no_ack(destination, &[], body, transaction)
            .await
    }

    pub async fn subscribe(&mut self, destination: &str) -> Result<()> {
        self.conn.subscribe(destination, &[]).await
    }

    pub async fn unsubscribe(&mut self, destination: &str) -> Result<()> {
        self.conn.unsubscribe(destination, &[]).await
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
