use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::config::TcpConfig;
use crate::error::ConnectError;
use crate::stream::{StreamSession, READ_POLL_INTERVAL, WRITE_TIMEOUT};
use crate::traits::{EventHandler, TransportKind};

const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(1);

/// Connect to the robot over TCP (blocking, bounded by the connect timeout).
///
/// Every resolved address is tried in turn; the error from the last attempt
/// is returned if none succeeds.
pub fn connect(config: &TcpConfig, handler: EventHandler) -> Result<StreamSession, ConnectError> {
    let addr = format!("{}:{}", config.host, config.port);
    let timeout = config.connect_timeout().max(MIN_CONNECT_TIMEOUT);

    let candidates: Vec<SocketAddr> = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|source| ConnectError::Resolve {
            addr: addr.clone(),
            source,
        })?
        .collect();
    if candidates.is_empty() {
        return Err(ConnectError::Resolve {
            addr,
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
        });
    }

    let mut last_err = None;
    let mut connected = None;
    for candidate in candidates {
        debug!(%candidate, ?timeout, "connecting");
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => {
                connected = Some(stream);
                break;
            }
            Err(err) => last_err = Some(err),
        }
    }

    let stream = match (connected, last_err) {
        (Some(stream), _) => stream,
        (None, Some(err)) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            return Err(ConnectError::Timeout { addr, timeout });
        }
        (None, Some(source)) => return Err(ConnectError::Connect { addr, source }),
        (None, None) => {
            return Err(ConnectError::Connect {
                addr,
                source: std::io::Error::from(ErrorKind::NotConnected),
            })
        }
    };

    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let writer = stream.try_clone()?;
    let control = stream.try_clone()?;

    let endpoint = stream
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or(addr);

    let session = StreamSession::spawn(
        TransportKind::Tcp,
        endpoint,
        stream,
        writer,
        handler,
        Some(Box::new(move || {
            let _ = control.shutdown(Shutdown::Both);
        })),
    )?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::time::Instant;

    use crossbeam_channel::unbounded;

    use super::*;
    use crate::traits::{TransportEvent, TransportSession};

    fn local_config(port: u16) -> TcpConfig {
        TcpConfig::new("127.0.0.1", port)
    }

    #[test]
    fn exchanges_lines_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut lines = BufReader::new(stream.try_clone().unwrap());
            let mut received = String::new();
            lines.read_line(&mut received).unwrap();
            let mut stream = stream;
            stream.write_all(b"{\"battery\":64.0}\r\n").unwrap();
            received
        });

        let (tx, events) = unbounded();
        let handler: EventHandler = Arc::new(move |event: TransportEvent| {
            let _ = tx.send(event);
        });
        let mut session = connect(&local_config(port), handler).unwrap();
        assert_eq!(session.kind(), TransportKind::Tcp);
        assert!(session.is_open());

        session.send(b"{\"command\":\"reset_zero\",\"timestamp\":1}\n");
        assert_eq!(
            server.join().unwrap(),
            "{\"command\":\"reset_zero\",\"timestamp\":1}\n"
        );

        match events.recv_timeout(Duration::from_secs(2)).unwrap() {
            TransportEvent::Frame(line) => assert_eq!(line.as_ref(), b"{\"battery\":64.0}"),
            other => panic!("expected frame, got {other:?}"),
        }

        session.close();
        assert!(!session.is_open());
    }

    #[test]
    fn oversized_line_tail_is_not_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(&vec![b'a'; armlink_frame::DEFAULT_MAX_LINE + 4096])
                .unwrap();
            stream.flush().unwrap();
            std::thread::sleep(Duration::from_millis(100));
            stream
                .write_all(b"{\"battery\":1.0}\n{\"battery\":2.0}\n")
                .unwrap();
            stream
        });

        let (tx, events) = unbounded();
        let handler: EventHandler = Arc::new(move |event: TransportEvent| {
            let _ = tx.send(event);
        });
        let mut session = connect(&local_config(port), handler).unwrap();

        match events.recv_timeout(Duration::from_secs(2)).unwrap() {
            TransportEvent::Frame(line) => assert_eq!(line.as_ref(), b"{\"battery\":2.0}"),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(session.is_open());

        session.close();
        drop(server.join().unwrap());
    }

    #[test]
    fn peer_close_reported_once() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let (tx, events) = unbounded();
        let handler: EventHandler = Arc::new(move |event: TransportEvent| {
            let _ = tx.send(event);
        });
        let mut session = connect(&local_config(port), handler).unwrap();
        server.join().unwrap();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(event, TransportEvent::Error(_)));
        assert!(!session.is_open());

        session.close();
        assert!(events.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn refused_connection_fails_within_bound() {
        // Bind then drop to get a port with no listener.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let handler: EventHandler = Arc::new(|_: TransportEvent| {});
        let start = Instant::now();
        let err = connect(&local_config(port), handler).unwrap_err();
        assert!(start.elapsed() <= Duration::from_millis(3500));
        assert!(matches!(
            err,
            ConnectError::Connect { .. } | ConnectError::Timeout { .. }
        ));
    }
}
