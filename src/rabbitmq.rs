//! RabbitMQ dialect (STOMP adapter).
//!
//! Differences from the baseline: the broker terminates frames with a bare
//! `\0`, sends are typed `application/octet-stream`, topics route through
//! the `amq.topic` exchange, and durable queues are declared by a transient
//! side-connection that subscribes with `durable: true` and disconnects.

use std::collections::HashMap;

use tracing::debug;

use crate::client::{ConnectConfig, Connection};
use crate::token;
use crate::{Message, Result};

use tokio::net::TcpStream;

const CONTENT_TYPE: (&str, &str) = ("content-type", "application/octet-stream");
const TOPIC_EXCHANGE: &str = "amq.topic";

/// Client for RabbitMQ's STOMP adapter.
///
/// Keeps the connect credentials so durable queues can be declared through
/// ad-hoc side-connections, and a map from topic name to the server-facing
/// subscription id.
pub struct RabbitMq {
    conn: Connection<TcpStream>,
    address: String,
    login: Option<String>,
    passcode: Option<String>,
    topics: HashMap<String, String>,
    topic_seq: u64,
}

impl RabbitMq {
    /// Connect and handshake. `prefetch` caps unacked in-flight messages
    /// per subscriber broker-side.
    pub async fn connect(
        address: &str,
        login: Option<&str>,
        passcode: Option<&str>,
        prefetch: Option<u32>,
    ) -> Result<Self> {
        let conn = Self::open(address, login, passcode, prefetch).await?;
        Ok(RabbitMq {
            conn,
            address: address.to_string(),
            login: login.map(str::to_string),
            passcode: passcode.map(str::to_string),
            topics: HashMap::new(),
            topic_seq: 0,
        })
    }

    async fn open(
        address: &str,
        login: Option<&str>,
        passcode: Option<&str>,
        prefetch: Option<u32>,
    ) -> Result<Connection<TcpStream>> {
        let mut config = ConnectConfig::with_credentials(login, passcode);
        config.eof_nl = false;
        if let Some(n) = prefetch {
            config.headers.push(("prefetch".to_string(), n.to_string()));
        }
        Connection::connect(address, config).await
    }

    pub async fn send(&mut self, queue: &str, body: &[u8], transaction: Option<&str>) -> Result<()> {
        self.conn
            .send(&queue_destination(queue), &send_headers(), body, transaction)
            .await
    }

    pub async fn send_no_ack(
        &mut self,
        queue: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send_no_ack(&queue_destination(queue), &send_headers(), body, transaction)
            .await
    }

    pub async fn topic_send(
        &mut self,
        topic: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send(&topic_destination(topic), &topic_headers(), body, transaction)
            .await
    }

    pub async fn topic_send_no_ack(
        &mut self,
        topic: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.conn
            .send_no_ack(&topic_destination(topic), &topic_headers(), body, transaction)
            .await
    }

    /// Subscribe to a queue, declaring it durable and non-auto-delete on the
    /// broker as a side effect. Messages must be acked (`ack: client`).
    pub async fn subscribe_queue(&mut self, queue: &str) -> Result<()> {
        let headers = vec![
            ("auto-delete".to_string(), "false".to_string()),
            ("durable".to_string(), "true".to_string()),
            ("ack".to_string(), "client".to_string()),
        ];
        self.conn
            .subscribe(&queue_destination(queue), &headers)
            .await
    }

    pub async fn unsubscribe_queue(&mut self, queue: &str) -> Result<()> {
        self.conn.unsubscribe(&queue_destination(queue), &[]).await
    }

    /// Subscribe to a topic through the `amq.topic` exchange. The broker
    /// binds a transient queue seeded with a random token we pass as the
    /// SUBSCRIBE body. No-op when already subscribed.
    pub async fn subscribe_topic(&mut self, topic: &str) -> Result<()> {
        if self.topics.contains_key(topic) {
            return Ok(());
        }
        self.topic_seq += 1;
        let id = format!("topic-{}", self.topic_seq);
        let headers = vec![
            ("exchange".to_string(), TOPIC_EXCHANGE.to_string()),
            ("routing_key".to_string(), topic_destination(topic)),
            ("id".to_string(), id.clone()),
        ];
        let body = token::random_token().into_bytes();
        self.conn
            .send_with_receipt("SUBSCRIBE", headers, Some(body), "subscribing to topic")
            .await?;
        self.topics.insert(topic.to_string(), id);
        Ok(())
    }

    /// No-op when there is no live subscription for `topic`.
    pub async fn unsubscribe_topic(&mut self, topic: &str) -> Result<()> {
        let Some(id) = self.topics.get(topic).cloned() else {
            return Ok(());
        };
        let headers = vec![("id".to_string(), id)];
        self.conn
            .unsubscribe(&topic_destination(topic), &headers)
            .await?;
        self.topics.remove(topic);
        Ok(())
    }

    /// Declare a durable queue: open a transient side-connection with
    /// `prefetch: 1` and the saved credentials, subscribe to the queue
    /// (which creates it `durable`/non-`auto-delete` broker-side) and
    /// disconnect without consuming anything. The broker keeping the queue
    /// across the disconnect is documented RabbitMQ behavior, not a STOMP
    /// guarantee.
    pub async fn create_queue(&self, queue: &str) -> Result<()> {
        debug!(queue, "declaring durable queue via side-connection");
        let conn = Self::open(
            &self.address,
            self.login.as_deref(),
            self.passcode.as_deref(),
            Some(1),
        )
        .await?;
        let mut side = RabbitMq {
            conn,
            address: self.address.clone(),
            login: self.login.clone(),
            passcode: self.passcode.clone(),
            topics: HashMap::new(),
            topic_seq: 0,
        };
        side.subscribe_queue(queue).await?;
        side.disconnect().await
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

fn topic_destination(topic: &str) -> String {
    format!("/topic/{topic}")
}

fn send_headers() -> Vec<(String, String)> {
    vec![(CONTENT_TYPE.0.to_string(), CONTENT_TYPE.1.to_string())]
}

fn topic_headers() -> Vec<(String, String)> {
    let mut headers = send_headers();
    headers.push(("exchange".to_string(), TOPIC_EXCHANGE.to_string()));
    headers
}
