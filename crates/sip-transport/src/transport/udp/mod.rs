use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, MAX_UDP_DATAGRAM_SIZE};

/// UDP transport for SIP messages
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: UdpSocket,
    closed: watch::Sender<bool>,
    last_received: Mutex<Option<SocketAddr>>,
    max_datagram_size: usize,
}

impl UdpTransport {
    /// Creates a new UDP transport bound to the specified address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_limit(addr, MAX_UDP_DATAGRAM_SIZE).await
    }

    /// Creates a new UDP transport that rejects datagrams above `max_datagram_size`
    pub async fn bind_with_limit(addr: SocketAddr, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("SIP UDP transport bound to {}", local_addr);

        let (closed, _) = watch::channel(false);
        Ok(UdpTransport {
            inner: Arc::new(UdpTransportInner {
                socket,
                closed,
                last_received: Mutex::new(None),
                max_datagram_size,
            }),
        })
    }

    pub fn max_datagram_size(&self) -> usize {
        self.inner.max_datagram_size
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn write(&self, data: &[u8], destination: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        debug!("Sending {} byte message to {}", data.len(), destination);
        trace!(message = %String::from_utf8_lossy(data), "UDP send");

        let sent = self.inner.socket.send_to(data, destination).await?;
        if sent != data.len() {
            return Err(Error::WriteFailed {
                destination,
                reason: format!("partial datagram: {} of {} bytes", sent, data.len()),
            });
        }
        Ok(())
    }

    async fn read(&self) -> Result<(Bytes, SocketAddr)> {
        let max = self.inner.max_datagram_size;
        // One spare byte tells a full-size datagram apart from a truncated one
        let mut buf = vec![0u8; max + 1];
        let mut closed = self.inner.closed.subscribe();

        let (len, source) = tokio::select! {
            _ = closed.wait_for(|closed| *closed) => return Err(Error::TransportClosed),
            received = self.inner.socket.recv_from(&mut buf) => received?,
        };

        *self.inner.last_received.lock() = Some(source);
        if len > max {
            warn!(source = %source, max, "Dropping oversized datagram");
            return Err(Error::MessageTooLarge { size: len, max });
        }

        debug!("Received {} bytes from {}", len, source);
        buf.truncate(len);
        Ok((Bytes::from(buf), source))
    }

    fn is_reliable(&self) -> bool {
        false
    }

    fn local_address(&self) -> Result<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    fn last_received_address(&self) -> Option<SocketAddr> {
        *self.inner.last_received.lock()
    }

    async fn close(&self) -> Result<()> {
        if !self.inner.closed.send_replace(true) {
            info!("UDP transport closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(addr) = self.inner.socket.local_addr() {
            write!(f, "UdpTransport({})", addr)
        } else {
            write!(f, "UdpTransport(<e>)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_udp_send_receive() {
        let a = UdpTransport::bind(localhost()).await.unwrap();
        let b = UdpTransport::bind(localhost()).await.unwrap();
        let b_addr = b.local_address().unwrap();

        a.write(b"OPTIONS sip:b SIP/2.0\r\n\r\n", b_addr).await.unwrap();
        let (data, source) = b.read().await.unwrap();

        assert_eq!(&data[..], b"OPTIONS sip:b SIP/2.0\r\n\r\n");
        assert_eq!(source, a.local_address().unwrap());
        assert_eq!(b.last_received_address(), Some(source));
        assert!(!b.is_reliable());
    }

    #[tokio::test]
    async fn test_oversized_datagram_rejected() {
        let a = UdpTransport::bind(localhost()).await.unwrap();
        let b = UdpTransport::bind_with_limit(localhost(), 16).await.unwrap();

        a.write(&[b'x'; 64], b.local_address().unwrap()).await.unwrap();
        match b.read().await {
            Err(Error::MessageTooLarge { max, .. }) => assert_eq!(max, 16),
            other => panic!("expected MessageTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_wakes_reader() {
        let transport = UdpTransport::bind(localhost()).await.unwrap();
        let reader = transport.clone();
        let pending = tokio::spawn(async move { reader.read().await });

        tokio::task::yield_now().await;
        transport.close().await.unwrap();

        assert!(matches!(pending.await.unwrap(), Err(Error::TransportClosed)));
        assert!(transport.is_closed());
        assert!(matches!(
            transport.write(b"x", localhost()).await,
            Err(Error::TransportClosed)
        ));
    }
}
