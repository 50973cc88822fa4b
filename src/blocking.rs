//! Blocking facade over the async client.
//!
//! Each connection owns a single-threaded tokio runtime and drives the
//! async engine to completion on every call, so a public call blocks the
//! calling thread for exactly one frame exchange. Must not be used from
//! inside an async runtime.

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::runtime::{Builder, Runtime};

use crate::client::ConnectConfig;
use crate::{client, ocamlmq, rabbitmq};
use crate::{Message, Result};

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_io().build()?)
}

/// Blocking counterpart of [`crate::Connection`].
pub struct Connection {
    rt: Runtime,
    inner: client::Connection<TcpStream>,
}

impl Connection {
    pub fn connect(address: impl ToSocketAddrs, config: ConnectConfig) -> Result<Connection> {
        let rt = runtime()?;
        let inner = rt.block_on(client::Connection::connect(address, config))?;
        Ok(Connection { rt, inner })
    }

    pub fn send(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.send(destination, headers, body, transaction))
    }

    pub fn send_no_ack(
        &mut self,
        destination: &str,
        headers: &[(String, String)],
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.send_no_ack(destination, headers, body, transaction))
    }

    pub fn subscribe(&mut self, destination: &str, headers: &[(String, String)]) -> Result<()> {
        self.rt.block_on(self.inner.subscribe(destination, headers))
    }

    pub fn unsubscribe(&mut self, destination: &str, headers: &[(String, String)]) -> Result<()> {
        self.rt
            .block_on(self.inner.unsubscribe(destination, headers))
    }

    pub fn receive_msg(&mut self) -> Result<Message> {
        self.rt.block_on(self.inner.receive_msg())
    }

    pub fn ack_msg(&mut self, message: &Message, transaction: Option<&str>) -> Result<()> {
        self.rt.block_on(self.inner.ack_msg(message, transaction))
    }

    pub fn transaction_begin(&mut self) -> Result<String> {
        self.rt.block_on(self.inner.transaction_begin())
    }

    pub fn transaction_commit(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit(transaction))
    }

    pub fn transaction_abort(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort(transaction))
    }

    pub fn transaction_commit_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit_all())
    }

    pub fn transaction_abort_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort_all())
    }

    pub fn transactions(&self) -> Vec<String> {
        self.inner.transactions().map(str::to_string).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.disconnect())
    }
}

/// Blocking counterpart of [`crate::ocamlmq::OcamlMq`].
pub struct OcamlMq {
    rt: Runtime,
    inner: ocamlmq::OcamlMq<TcpStream>,
}

impl OcamlMq {
    pub fn connect(
        address: impl ToSocketAddrs,
        login: Option<&str>,
        passcode: Option<&str>,
    ) -> Result<OcamlMq> {
        let rt = runtime()?;
        let inner = rt.block_on(ocamlmq::OcamlMq::connect(address, login, passcode))?;
        Ok(OcamlMq { rt, inner })
    }

    pub fn send(
        &mut self,
        queue: &str,
        body: &[u8],
        ack_timeout: Option<f64>,
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.send(queue, body, ack_timeout, transaction))
    }

    pub fn send_no_ack(
        &mut self,
        queue: &str,
        body: &[u8],
        ack_timeout: Option<f64>,
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.send_no_ack(queue, body, ack_timeout, transaction))
    }

    pub fn subscribe(&mut self, queue: &str) -> Result<()> {
        self.rt.block_on(self.inner.subscribe(queue))
    }

    pub fn unsubscribe(&mut self, queue: &str) -> Result<()> {
        self.rt.block_on(self.inner.unsubscribe(queue))
    }

    pub fn queue_size(&mut self, queue: &str) -> Result<Option<i64>> {
        self.rt.block_on(self.inner.queue_size(queue))
    }

    pub fn receive_msg(&mut self) -> Result<Message> {
        self.rt.block_on(self.inner.receive_msg())
    }

    pub fn ack_msg(&mut self, message: &Message, transaction: Option<&str>) -> Result<()> {
        self.rt.block_on(self.inner.ack_msg(message, transaction))
    }

    pub fn transaction_begin(&mut self) -> Result<String> {
        self.rt.block_on(self.inner.transaction_begin())
    }

    pub fn transaction_commit(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit(transaction))
    }

    pub fn transaction_abort(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort(transaction))
    }

    pub fn transaction_commit_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit_all())
    }

    pub fn transaction_abort_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort_all())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.disconnect())
    }
}

/// Blocking counterpart of [`crate::rabbitmq::RabbitMq`].
pub struct RabbitMq {
    rt: Runtime,
    inner: rabbitmq::RabbitMq,
}

impl RabbitMq {
    pub fn connect(
        address: &str,
        login: Option<&str>,
        passcode: Option<&str>,
        prefetch: Option<u32>,
    ) -> Result<RabbitMq> {
        let rt = runtime()?;
        let inner = rt.block_on(rabbitmq::RabbitMq::connect(
            address, login, passcode, prefetch,
        ))?;
        Ok(RabbitMq { rt, inner })
    }

    pub fn send(&mut self, queue: &str, body: &[u8], transaction: Option<&str>) -> Result<()> {
        self.rt.block_on(self.inner.send(queue, body, transaction))
    }

    pub fn send_no_ack(
        &mut self,
        queue: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.send_no_ack(queue, body, transaction))
    }

    pub fn topic_send(
        &mut self,
        topic: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.topic_send(topic, body, transaction))
    }

    pub fn topic_send_no_ack(
        &mut self,
        topic: &str,
        body: &[u8],
        transaction: Option<&str>,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.topic_send_no_ack(topic, body, transaction))
    }

    pub fn subscribe_queue(&mut self, queue: &str) -> Result<()> {
        self.rt.block_on(self.inner.subscribe_queue(queue))
    }

    pub fn unsubscribe_queue(&mut self, queue: &str) -> Result<()> {
        self.rt.block_on(self.inner.unsubscribe_queue(queue))
    }

    pub fn subscribe_topic(&mut self, topic: &str) -> Result<()> {
        self.rt.block_on(self.inner.subscribe_topic(topic))
    }

    pub fn unsubscribe_topic(&mut self, topic: &str) -> Result<()> {
        self.rt.block_on(self.inner.unsubscribe_topic(topic))
    }

    pub fn create_queue(&mut self, queue: &str) -> Result<()> {
        self.rt.block_on(self.inner.create_queue(queue))
    }

    pub fn receive_msg(&mut self) -> Result<Message> {
        self.rt.block_on(self.inner.receive_msg())
    }

    pub fn ack_msg(&mut self, message: &Message, transaction: Option<&str>) -> Result<()> {
        self.rt.block_on(self.inner.ack_msg(message, transaction))
    }

    pub fn transaction_begin(&mut self) -> Result<String> {
        self.rt.block_on(self.inner.transaction_begin())
    }

    pub fn transaction_commit(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit(transaction))
    }

    pub fn transaction_abort(&mut self, transaction: &str) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort(transaction))
    }

    pub fn transaction_commit_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_commit_all())
    }

    pub fn transaction_abort_all(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.transaction_abort_all())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.disconnect())
    }
}
