use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use armlink_frame::{strip_line_ending, DEFAULT_MAX_LINE};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::UdpConfig;
use crate::error::{ConnectError, TransportError};
use crate::stream::READ_POLL_INTERVAL;
use crate::traits::{EventHandler, TransportEvent, TransportKind, TransportSession};

/// A datagram session: one JSON object per datagram in both directions.
///
/// "Open" means the local bind succeeded; there is no handshake with the
/// peer, so sends succeed even when nothing is listening.
pub struct UdpSession {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    open: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// Bind the local socket and start receiving datagrams.
pub fn bind(config: &UdpConfig, handler: EventHandler) -> Result<UdpSession, ConnectError> {
    let peer_label = format!("{}:{}", config.host, config.port);
    let peer = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            addr: peer_label.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ConnectError::Resolve {
            addr: peer_label,
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
        })?;

    let unspecified = match peer.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let local = SocketAddr::new(unspecified, config.bind_port());
    let socket = UdpSocket::bind(local).map_err(|source| ConnectError::Bind {
        addr: local.to_string(),
        source,
    })?;
    socket.set_read_timeout(Some(READ_POLL_INTERVAL))?;
    let socket = Arc::new(socket);
    let open = Arc::new(AtomicBool::new(true));

    let reader_socket = Arc::clone(&socket);
    let reader_open = Arc::clone(&open);
    let reader = thread::Builder::new()
        .name("armlink-udp-rx".into())
        .spawn(move || recv_loop(&reader_socket, &reader_open, &handler))?;

    info!(
        local = %socket.local_addr().map(|a| a.to_string()).unwrap_or_default(),
        %peer,
        "udp session open"
    );

    Ok(UdpSession {
        socket,
        peer,
        open,
        reader: Some(reader),
    })
}

fn recv_loop(socket: &UdpSocket, open: &AtomicBool, handler: &EventHandler) {
    let mut buf = vec![0u8; DEFAULT_MAX_LINE + 2];
    while open.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => {
                let payload = strip_line_ending(&buf[..len]);
                if payload.is_empty() {
                    continue;
                }
                debug!(%from, len, "received datagram");
                handler(TransportEvent::Frame(Bytes::copy_from_slice(payload)));
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            // ICMP port-unreachable from an earlier send; the socket is still usable.
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused
                ) =>
            {
                debug!(error = %err, "peer unreachable");
            }
            Err(err) => {
                if open.swap(false, Ordering::AcqRel) {
                    warn!(error = %err, "udp receive failed");
                    handler(TransportEvent::Error(TransportError::Io(err)));
                }
                break;
            }
        }
    }
    debug!("udp reader thread exiting");
}

impl UdpSession {
    /// Address the socket is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Address datagrams are sent to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl TransportSession for UdpSession {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn send(&self, payload: &[u8]) {
        if !self.is_open() {
            debug!("udp session not open, dropping datagram");
            return;
        }
        let datagram = strip_line_ending(payload);
        match self.socket.send_to(datagram, self.peer) {
            Ok(sent) => debug!(peer = %self.peer, len = sent, "sent datagram"),
            Err(err) => warn!(peer = %self.peer, error = %err, "udp send failed, datagram dropped"),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        if let Some(handle) = self.reader.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("udp reader thread panicked");
            }
        }
        if was_open {
            info!(peer = %self.peer, "udp session closed");
        }
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for UdpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpSession")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}
