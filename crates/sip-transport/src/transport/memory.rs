//! In-process transport pair.
//!
//! Both ends of a [`MemoryTransport::pair`] see each other as an ordinary
//! peer address. Tests drive one end as the scripted remote party and inspect
//! everything the other end wrote.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{Transport, MAX_UDP_DATAGRAM_SIZE};

type Datagram = (Bytes, SocketAddr);

/// One end of a connected in-memory transport pair
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    local: SocketAddr,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    sent: Mutex<Vec<(Bytes, SocketAddr)>>,
    last_received: Mutex<Option<SocketAddr>>,
    closed: watch::Sender<bool>,
    fail_writes: AtomicBool,
    reliable: AtomicBool,
    max_datagram_size: usize,
}

impl MemoryTransport {
    /// Creates two transports wired to each other.
    ///
    /// Whatever one end writes, regardless of destination, is delivered to
    /// the other with the writer's address as its source.
    pub fn pair(addr_a: SocketAddr, addr_b: SocketAddr) -> (MemoryTransport, MemoryTransport) {
        let (tx_ab, rx_ab) = mpsc::unbounded_channel();
        let (tx_ba, rx_ba) = mpsc::unbounded_channel();
        let a = MemoryTransport::new(addr_a, addr_b, tx_ab, rx_ba);
        let b = MemoryTransport::new(addr_b, addr_a, tx_ba, rx_ab);
        (a, b)
    }

    fn new(
        local: SocketAddr,
        peer: SocketAddr,
        tx: mpsc::UnboundedSender<Datagram>,
        rx: mpsc::UnboundedReceiver<Datagram>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        MemoryTransport {
            inner: Arc::new(MemoryInner {
                local,
                peer,
                tx,
                rx: tokio::sync::Mutex::new(rx),
                sent: Mutex::new(Vec::new()),
                last_received: Mutex::new(None),
                closed,
                fail_writes: AtomicBool::new(false),
                reliable: AtomicBool::new(false),
                max_datagram_size: MAX_UDP_DATAGRAM_SIZE,
            }),
        }
    }

    /// Marks this end as a reliable transport
    pub fn with_reliable(self, reliable: bool) -> Self {
        self.inner.reliable.store(reliable, Ordering::SeqCst);
        self
    }

    /// Makes every following write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Address of the other end
    pub fn peer_address(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Every message written so far, with its destination
    pub fn sent(&self) -> Vec<(Bytes, SocketAddr)> {
        self.inner.sent.lock().clone()
    }

    /// Messages written so far, decoded lossily as text
    pub fn sent_text(&self) -> Vec<String> {
        self.inner
            .sent
            .lock()
            .iter()
            .map(|(data, _)| String::from_utf8_lossy(data).into_owned())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.inner.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn write(&self, data: &[u8], destination: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("write to {} refused", destination),
            )));
        }
        if data.len() > self.inner.max_datagram_size {
            return Err(Error::MessageTooLarge {
                size: data.len(),
                max: self.inner.max_datagram_size,
            });
        }

        let data = Bytes::copy_from_slice(data);
        debug!("Memory transport {} -> {} ({} bytes)", self.inner.local, destination, data.len());
        self.inner.sent.lock().push((data.clone(), destination));
        self.inner
            .tx
            .send((data, self.inner.local))
            .map_err(|_| Error::TransportClosed)
    }

    async fn read(&self) -> Result<(Bytes, SocketAddr)> {
        let mut closed = self.inner.closed.subscribe();
        let mut rx = self.inner.rx.lock().await;

        let received = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => return Err(Error::TransportClosed),
            received = rx.recv() => received,
        };
        match received {
            Some((data, source)) => {
                *self.inner.last_received.lock() = Some(source);
                Ok((data, source))
            }
            None => Err(Error::TransportClosed),
        }
    }

    fn is_reliable(&self) -> bool {
        self.inner.reliable.load(Ordering::SeqCst)
    }

    fn local_address(&self) -> Result<SocketAddr> {
        Ok(self.inner.local)
    }

    fn last_received_address(&self) -> Option<SocketAddr> {
        *self.inner.last_received.lock()
    }

    async fn close(&self) -> Result<()> {
        self.inner.closed.send_replace(true);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryTransport({} <-> {})", self.inner.local, self.inner.peer)
    }
}
