use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use armlink_frame::{is_timeout, FrameError, LineReader, LineWriter};
use bytes::Bytes;
use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::traits::{EventHandler, TransportEvent, TransportKind, TransportSession};

/// Read timeout used by I/O threads so they notice `close` promptly.
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on one blocking write, so `close` cannot hang on a stalled peer.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Maximum number of outbound messages waiting for the writer thread.
pub const SEND_QUEUE_CAPACITY: usize = 256;

type ShutdownHook = Box<dyn FnOnce() + Send>;

/// State shared between a session handle and its I/O threads.
struct SessionState {
    kind: TransportKind,
    endpoint: String,
    open: AtomicBool,
    handler: EventHandler,
}

impl SessionState {
    /// Mark the session failed; the handler hears about it only the first time.
    fn fail(&self, err: TransportError) {
        if self.open.swap(false, Ordering::AcqRel) {
            warn!(transport = %self.kind, endpoint = %self.endpoint, error = %err, "transport failed");
            (self.handler)(TransportEvent::Error(err));
        }
    }
}

/// A newline-framed session over a byte stream (TCP socket or serial port).
///
/// Inbound lines are read on a dedicated reader thread and handed to the
/// event handler. Outbound messages go through a bounded queue drained by a
/// writer thread, so [`send`](TransportSession::send) never blocks.
pub struct StreamSession {
    state: Arc<SessionState>,
    tx: Option<Sender<Bytes>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    shutdown: Option<ShutdownHook>,
}

impl StreamSession {
    /// Start the I/O threads for an already-connected stream.
    ///
    /// `reader` must have a read timeout configured (see
    /// [`READ_POLL_INTERVAL`]) or be unblocked by `shutdown` so that
    /// [`close`](TransportSession::close) can join it.
    pub fn spawn<R, W>(
        kind: TransportKind,
        endpoint: String,
        reader: R,
        writer: W,
        handler: EventHandler,
        shutdown: Option<ShutdownHook>,
    ) -> std::io::Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let state = Arc::new(SessionState {
            kind,
            endpoint,
            open: AtomicBool::new(true),
            handler,
        });
        let (tx, rx) = bounded::<Bytes>(SEND_QUEUE_CAPACITY);

        let reader_state = Arc::clone(&state);
        let reader = thread::Builder::new()
            .name(format!("armlink-{kind}-rx"))
            .spawn(move || read_loop(reader, &reader_state))?;

        let writer_state = Arc::clone(&state);
        let writer = thread::Builder::new()
            .name(format!("armlink-{kind}-tx"))
            .spawn(move || {
                let mut framed = LineWriter::new(writer);
                for payload in rx {
                    if let Err(err) = framed.send(&payload) {
                        writer_state.fail(err.into());
                        break;
                    }
                }
            })?;

        info!(transport = %kind, endpoint = %state.endpoint, "session open");

        Ok(Self {
            state,
            tx: Some(tx),
            reader: Some(reader),
            writer: Some(writer),
            shutdown,
        })
    }

    /// Endpoint description for diagnostics.
    pub fn endpoint(&self) -> &str {
        &self.state.endpoint
    }

    fn join(&self, handle: Option<JoinHandle<()>>) {
        let Some(handle) = handle else {
            return;
        };
        // A handler may close the session from the I/O thread itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(transport = %self.state.kind, "I/O thread panicked");
        }
    }
}

fn read_loop<R: Read>(stream: R, state: &SessionState) {
    let mut reader = LineReader::new(stream);
    while state.open.load(Ordering::Acquire) {
        match reader.read_line() {
            Ok(line) => {
                debug!(transport = %state.kind, len = line.len(), "received line");
                (state.handler)(TransportEvent::Frame(line));
            }
            Err(err) if is_timeout(&err) => continue,
            Err(FrameError::LineTooLong { size, max }) => {
                warn!(transport = %state.kind, size, max, "discarding oversized line");
            }
            Err(err) => {
                state.fail(err.into());
                break;
            }
        }
    }
    debug!(transport = %state.kind, "reader thread exiting");
}

impl TransportSession for StreamSession {
    fn kind(&self) -> TransportKind {
        self.state.kind
    }

    fn send(&self, payload: &[u8]) {
        if !self.is_open() {
            debug!(transport = %self.state.kind, "session not open, dropping message");
            return;
        }
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(Bytes::copy_from_slice(payload)) {
            Ok(()) => debug!(transport = %self.state.kind, len = payload.len(), "queued message"),
            Err(TrySendError::Full(_)) => {
                warn!(transport = %self.state.kind, "send queue full, dropping message");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(transport = %self.state.kind, "writer gone, dropping message");
            }
        }
    }

    fn is_open(&self) -> bool {
        self.state.open.load(Ordering::Acquire)
    }

    fn close(&mut self) {
        let was_open = self.state.open.swap(false, Ordering::AcqRel);
        // Dropping the sender ends the writer loop once the queue drains, so
        // messages queued before close still go out.
        self.tx.take();
        let writer = self.writer.take();
        self.join(writer);
        if let Some(hook) = self.shutdown.take() {
            hook();
        }
        let reader = self.reader.take();
        self.join(reader);

        if was_open {
            info!(transport = %self.state.kind, endpoint = %self.state.endpoint, "session closed");
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("kind", &self.state.kind)
            .field("endpoint", &self.state.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::sync::Mutex;

    use crossbeam_channel::{unbounded, Receiver};

    use super::*;

    fn collecting_handler() -> (EventHandler, Receiver<TransportEvent>) {
        let (tx, rx) = unbounded();
        let handler: EventHandler = Arc::new(move |event: TransportEvent| {
            let _ = tx.send(event);
        });
        (handler, rx)
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn delivers_lines_then_reports_eof_once() {
        let (handler, events) = collecting_handler();
        let input = Cursor::new(b"{\"battery\":80}\n{\"battery\":79}\n".to_vec());
        let mut session = StreamSession::spawn(
            TransportKind::Serial,
            "test".into(),
            input,
            io::sink(),
            handler,
            None,
        )
        .unwrap();

        let timeout = Duration::from_secs(2);
        match events.recv_timeout(timeout).unwrap() {
            TransportEvent::Frame(line) => assert_eq!(line.as_ref(), b"{\"battery\":80}"),
            other => panic!("expected frame, got {other:?}"),
        }
        assert!(matches!(
            events.recv_timeout(timeout).unwrap(),
            TransportEvent::Frame(_)
        ));
        assert!(matches!(
            events.recv_timeout(timeout).unwrap(),
            TransportEvent::Error(TransportError::Closed)
        ));

        session.close();
        assert!(!session.is_open());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn send_writes_newline_framed_payload() {
        let (handler, _events) = collecting_handler();
        let out = SharedBuf::default();
        let mut session = StreamSession::spawn(
            TransportKind::Tcp,
            "test".into(),
            PendingReader,
            out.clone(),
            handler,
            None,
        )
        .unwrap();

        session.send(b"{\"command\":\"enable\",\"timestamp\":1}\n");
        session.send(b"{\"command\":\"disable\",\"timestamp\":2}");
        session.close();

        let written = out.0.lock().unwrap().clone();
        assert_eq!(
            written,
            b"{\"command\":\"enable\",\"timestamp\":1}\n{\"command\":\"disable\",\"timestamp\":2}\n"
        );
    }

    #[test]
    fn send_after_close_is_dropped() {
        let (handler, _events) = collecting_handler();
        let out = SharedBuf::default();
        let mut session = StreamSession::spawn(
            TransportKind::Tcp,
            "test".into(),
            PendingReader,
            out.clone(),
            handler,
            None,
        )
        .unwrap();

        session.close();
        session.close();
        session.send(b"{}");
        assert!(out.0.lock().unwrap().is_empty());
    }

    /// Reader that always times out, like an idle socket.
    struct PendingReader;

    impl Read for PendingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(10));
            Err(io::Error::from(io::ErrorKind::TimedOut))
        }
    }
}
