// Socket abstraction under the transport.
//
// The transport never touches a `TcpStream` directly. It talks to a
// `Socket` (one connection attempt) obtained from a `Connector`, and drives
// it by polling: `poll_events` returns everything that happened since the
// last poll, in order. This keeps the transport single-threaded and lets
// tests substitute a scripted in-memory socket.
//
// `ReadyState` follows the WebSocket lifecycle. A socket starts
// `Connecting`, becomes `Open` when the `Open` event is polled, and ends
// `Closed` once its `Close` event has been polled or after a local `close`.
// A closed socket is never reused; the transport asks the connector for a
// new one.
//
// `TcpSocket` architecture (same split as the relay's server side):
// - a background thread connects, then loops on `read_frame`, forwarding
//   data and close frames through an `mpsc` channel;
// - writes happen synchronously on the caller's thread through a
//   `BufWriter` over a cloned stream;
// - a stream that ends without a close frame is reported as
//   `CloseCode::ABNORMAL`.
// Dropping a `TcpSocket` shuts its stream down, which ends the reader
// thread and discards any events still in flight.

use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use frontier_protocol::{CloseCode, Frame, read_frame, write_close, write_message};
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Message(Vec<u8>),
    Error(String),
    Close { code: CloseCode, reason: String },
}

/// One connection attempt to the authority.
pub trait Socket {
    fn ready_state(&self) -> ReadyState;

    /// Send one message. Only valid while `Open`.
    fn send(&mut self, msg: &[u8]) -> io::Result<()>;

    /// Close with `code`. The socket reports a matching `Close` event on a
    /// later poll if it had not already closed.
    fn close(&mut self, code: CloseCode, reason: &str);

    /// Everything that happened since the last poll, oldest first.
    fn poll_events(&mut self) -> Vec<SocketEvent>;
}

/// Opens sockets to a fixed endpoint.
pub trait Connector {
    fn connect(&mut self) -> Box<dyn Socket>;
}

/// Connects to the relay over TCP.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Connector for TcpConnector {
    fn connect(&mut self) -> Box<dyn Socket> {
        Box::new(TcpSocket::connect(self.addr.clone(), self.connect_timeout))
    }
}

/// What the background thread reports.
enum Inbound {
    Connected(TcpStream),
    Event(SocketEvent),
}

pub struct TcpSocket {
    state: ReadyState,
    writer: Option<BufWriter<TcpStream>>,
    inbox: Receiver<Inbound>,
    /// Events produced locally (by `close`), delivered on the next poll.
    local: Vec<SocketEvent>,
}

impl TcpSocket {
    /// Start connecting to `addr` in the background.
    pub fn connect(addr: String, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || run_reader(&addr, timeout, &tx));
        Self {
            state: ReadyState::Connecting,
            writer: None,
            inbox: rx,
            local: Vec::new(),
        }
    }

    fn shutdown(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.get_ref().shutdown(Shutdown::Both);
        }
    }
}

impl Socket for TcpSocket {
    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn send(&mut self, msg: &[u8]) -> io::Result<()> {
        match (&mut self.writer, self.state) {
            (Some(writer), ReadyState::Open) => write_message(writer, msg),
            _ => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("socket is {:?}", self.state),
            )),
        }
    }

    fn close(&mut self, code: CloseCode, reason: &str) {
        if self.state == ReadyState::Closed {
            return;
        }
        if !code.is_reserved() {
            if let Some(writer) = self.writer.as_mut() {
                let _ = write_close(writer, code, reason);
            }
        }
        self.shutdown();
        self.state = ReadyState::Closed;
        self.local.push(SocketEvent::Close {
            code,
            reason: reason.to_owned(),
        });
    }

    fn poll_events(&mut self) -> Vec<SocketEvent> {
        let mut events = std::mem::take(&mut self.local);
        loop {
            match self.inbox.try_recv() {
                Ok(Inbound::Connected(stream)) => {
                    if self.state == ReadyState::Closed {
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }
                    self.writer = Some(BufWriter::new(stream));
                    self.state = ReadyState::Open;
                    events.push(SocketEvent::Open);
                }
                Ok(Inbound::Event(event)) => {
                    // A locally closed socket reports nothing further.
                    if self.state == ReadyState::Closed {
                        continue;
                    }
                    if matches!(event, SocketEvent::Close { .. }) {
                        self.state = ReadyState::Closed;
                        self.shutdown();
                    }
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.state != ReadyState::Closed {
                        self.state = ReadyState::Closed;
                        events.push(SocketEvent::Close {
                            code: CloseCode::ABNORMAL,
                            reason: "reader stopped".into(),
                        });
                    }
                    break;
                }
            }
        }
        events
    }
}

impl Drop for TcpSocket {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background thread: connect, hand the write half to the socket, then
/// forward frames until the stream ends.
fn run_reader(addr: &str, timeout: Duration, tx: &Sender<Inbound>) {
    let stream = match connect_stream(addr, timeout) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(Inbound::Event(SocketEvent::Error(format!(
                "connect to {addr} failed: {e}"
            ))));
            let _ = tx.send(Inbound::Event(SocketEvent::Close {
                code: CloseCode::ABNORMAL,
                reason: e.to_string(),
            }));
            return;
        }
    };
    let write_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            let _ = tx.send(Inbound::Event(SocketEvent::Close {
                code: CloseCode::ABNORMAL,
                reason: e.to_string(),
            }));
            return;
        }
    };
    if tx.send(Inbound::Connected(write_half)).is_err() {
        return;
    }

    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader) {
            Ok(Frame::Data(bytes)) => {
                if tx.send(Inbound::Event(SocketEvent::Message(bytes))).is_err() {
                    break; // Socket dropped.
                }
            }
            Ok(Frame::Close { code, reason }) => {
                let _ = tx.send(Inbound::Event(SocketEvent::Close { code, reason }));
                break;
            }
            Err(e) => {
                debug!("socket to {addr} ended: {e}");
                let _ = tx.send(Inbound::Event(SocketEvent::Close {
                    code: CloseCode::ABNORMAL,
                    reason: e.to_string(),
                }));
                break;
            }
        }
    }
}

fn connect_stream(addr: &str, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for sock_addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&sock_addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{addr} resolved to nothing"))
    }))
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Instant;

    use super::*;

    fn poll_until(socket: &mut TcpSocket, pred: impl Fn(&SocketEvent) -> bool) -> Vec<SocketEvent> {
        let start = Instant::now();
        let mut seen = Vec::new();
        while start.elapsed() < Duration::from_secs(5) {
            let events = socket.poll_events();
            let done = events.iter().any(&pred);
            seen.extend(events);
            if done {
                return seen;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("timed out; saw {seen:?}");
    }

    #[test]
    fn tcp_socket_opens_receives_and_sees_close_code() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut socket = TcpSocket::connect(addr.to_string(), Duration::from_secs(5));
        assert_eq!(socket.ready_state(), ReadyState::Connecting);

        let (server, _) = listener.accept().unwrap();
        poll_until(&mut socket, |e| *e == SocketEvent::Open);
        assert_eq!(socket.ready_state(), ReadyState::Open);

        // Client to server.
        socket.send(b"{\"type\":\"ping\"}").unwrap();
        let mut server_reader = BufReader::new(server.try_clone().unwrap());
        assert_eq!(
            read_frame(&mut server_reader).unwrap(),
            Frame::Data(b"{\"type\":\"ping\"}".to_vec())
        );

        // Server to client, then an intentional close.
        let mut server_writer = BufWriter::new(server);
        write_message(&mut server_writer, b"hello").unwrap();
        write_close(&mut server_writer, CloseCode::NORMAL, "bye").unwrap();
        let events = poll_until(&mut socket, |e| matches!(e, SocketEvent::Close { .. }));
        assert!(events.contains(&SocketEvent::Message(b"hello".to_vec())));
        assert!(events.contains(&SocketEvent::Close {
            code: CloseCode::NORMAL,
            reason: "bye".into()
        }));
        assert_eq!(socket.ready_state(), ReadyState::Closed);
        assert!(socket.send(b"late").is_err());
    }

    #[test]
    fn vanished_peer_is_abnormal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut socket = TcpSocket::connect(addr.to_string(), Duration::from_secs(5));
        let (server, _) = listener.accept().unwrap();
        poll_until(&mut socket, |e| *e == SocketEvent::Open);
        drop(server);
        let events = poll_until(&mut socket, |e| matches!(e, SocketEvent::Close { .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            SocketEvent::Close {
                code: CloseCode::ABNORMAL,
                ..
            }
        )));
    }

    #[test]
    fn local_close_reports_its_own_code_once() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut socket = TcpSocket::connect(addr.to_string(), Duration::from_secs(5));
        let (_server, _) = listener.accept().unwrap();
        poll_until(&mut socket, |e| *e == SocketEvent::Open);

        socket.close(CloseCode::NORMAL, "leaving");
        assert_eq!(socket.ready_state(), ReadyState::Closed);
        let events = socket.poll_events();
        assert_eq!(
            events,
            vec![SocketEvent::Close {
                code: CloseCode::NORMAL,
                reason: "leaving".into()
            }]
        );
        thread::sleep(Duration::from_millis(50));
        assert!(socket.poll_events().is_empty());
    }

    #[test]
    fn reserved_close_code_sends_no_close_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut socket = TcpSocket::connect(addr.to_string(), Duration::from_secs(5));
        let (server, _) = listener.accept().unwrap();
        poll_until(&mut socket, |e| *e == SocketEvent::Open);

        socket.close(CloseCode::ABNORMAL, "lost");
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut server_reader = BufReader::new(server);
        let err = read_frame(&mut server_reader).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
