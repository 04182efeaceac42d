// TCP server and main event loop for the relay authority.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts new TCP
//   connections and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per connection): call `read_frame()` in a loop
//   and forward raw data frames as `InternalEvent::FrameFrom`. A close frame,
//   EOF, or read error ends the loop with `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Session`, validates each frame with
//   `parse_client_message`, and dispatches it. Waits with `recv_timeout` up
//   to the next turn deadline, so turns go out on schedule even while
//   messages keep arriving.
//
// The main thread is the only writer to client streams (through `Session`).
// Reader threads only read.
//
// A malformed frame is a per-message protocol error: it is logged and
// answered with `error`, and the connection stays open. Any frame, valid or
// not, counts as liveness; connections silent for `idle_timeout` are closed
// at the next turn boundary.
//
// Shutdown: `RelayHandle::stop` clears the `keep_running` flag; the main loop
// then closes every connection with `CloseCode::GOING_AWAY` and exits.

use std::io::{self, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use frontier_protocol::types::is_valid_id;
use frontier_protocol::{CloseCode, Frame, GameId, parse_client_message, read_frame};
use log::{debug, info, warn};

use crate::session::{ConnId, Session};

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection { stream: TcpStream },
    FrameFrom { conn: ConnId, bytes: Vec<u8> },
    Disconnected { conn: ConnId },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the relay exits on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a relay server.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub game_id: GameId,
    pub turn_interval: Duration,
    /// Sent opaquely to clients in `start`.
    pub game_config: serde_json::Value,
    /// Close connections silent for this long. `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7878,
            game_id: GameId::new("Frontier"),
            turn_interval: Duration::from_millis(100),
            game_config: serde_json::Value::Null,
            idle_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Start the relay server on a background thread. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_relay(config: RelayConfig) -> io::Result<(RelayHandle, SocketAddr)> {
    if !is_valid_id(config.game_id.as_str()) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid game id {:?}", config.game_id.as_str()),
        ));
    }
    if config.turn_interval.is_zero() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "turn interval must be positive",
        ));
    }

    let listener = TcpListener::bind((config.host.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_relay(listener, config, keep_running_clone);
    });

    info!("relay listening on {addr}");
    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is set to false.
fn run_relay(listener: TcpListener, config: RelayConfig, keep_running: Arc<AtomicBool>) {
    let mut session = Session::new(config.game_id.clone(), config.game_config);

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    // Non-blocking so the accept thread can check keep_running periodically.
    listener.set_nonblocking(true).ok();

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("accepted {peer}");
                    stream.set_nonblocking(false).ok();
                    stream.set_nodelay(true).ok();
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    break;
                }
            }
        }
    });

    let mut next_turn = Instant::now() + config.turn_interval;
    while keep_running.load(Ordering::SeqCst) {
        let timeout = next_turn.saturating_duration_since(Instant::now());
        match rx.recv_timeout(timeout) {
            Ok(event) => {
                handle_event(&mut session, event, &tx);
                // Drain any additional events that arrived during handling.
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut session, event, &tx);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if now >= next_turn {
            if session.joined_count() > 0 {
                session.flush_turn();
            }
            if let Some(timeout) = config.idle_timeout {
                session.close_idle(now, timeout);
            }
            next_turn += config.turn_interval;
            if next_turn <= now {
                next_turn = now + config.turn_interval;
            }
        }
    }

    info!(
        "relay for {} stopping after {} turns",
        session.game_id,
        session.turns().len()
    );
    session.close_all(CloseCode::GOING_AWAY, "relay shutting down");
}

/// Dispatch a single event to the session.
fn handle_event(session: &mut Session, event: InternalEvent, tx: &Sender<InternalEvent>) {
    match event {
        InternalEvent::NewConnection { stream } => handle_new_connection(session, stream, tx),
        InternalEvent::FrameFrom { conn, bytes } => {
            session.touch(conn, Instant::now());
            match parse_client_message(&bytes) {
                Ok(msg) => session.handle_message(conn, msg),
                Err(e) => {
                    warn!("dropping invalid message from connection {}: {e}", conn.0);
                    session.reject(conn, e.to_string());
                }
            }
        }
        InternalEvent::Disconnected { conn } => session.remove_connection(conn),
    }
}

/// Register a new connection and spawn its reader thread.
fn handle_new_connection(session: &mut Session, stream: TcpStream, tx: &Sender<InternalEvent>) {
    let read_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!("cannot clone accepted stream: {e}");
            return;
        }
    };
    let conn = session.add_connection(stream);
    let tx_reader = tx.clone();
    thread::spawn(move || reader_loop(BufReader::new(read_half), conn, &tx_reader));
}

/// Reader loop for a single connection. Runs in its own thread.
fn reader_loop(mut reader: BufReader<TcpStream>, conn: ConnId, tx: &Sender<InternalEvent>) {
    loop {
        match read_frame(&mut reader) {
            Ok(Frame::Data(bytes)) => {
                if tx.send(InternalEvent::FrameFrom { conn, bytes }).is_err() {
                    return; // Relay stopped.
                }
            }
            Ok(Frame::Close { code, reason }) => {
                debug!("connection {} closed: {} {reason:?}", conn.0, code.0);
                break;
            }
            Err(e) => {
                debug!("connection {} ended: {e}", conn.0);
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { conn });
}
