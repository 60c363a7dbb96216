use std::collections::HashMap;
use std::io::{self, BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::framing::{read_frame, write_frame};
use super::stats::{NetworkStats, StatsCounters};
use super::transport::{DisconnectReason, Transport, TransportError, TransportEvent};
use crate::command::PeerId;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct PeerHandle {
    outgoing: Sender<Vec<u8>>,
}

struct Inner {
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
    next_peer: AtomicU32,
    events: Sender<TransportEvent>,
    running: AtomicBool,
    stats: StatsCounters,
}

/// Length-framed TCP transport. Every peer gets a reader thread and a writer
/// thread; sends only enqueue, so a slow peer never blocks the caller.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<Inner>,
}

impl TcpTransport {
    fn new() -> (Self, Receiver<TransportEvent>) {
        let (events, rx) = crossbeam_channel::unbounded();
        let inner = Arc::new(Inner {
            peers: Mutex::new(HashMap::new()),
            next_peer: AtomicU32::new(1),
            events,
            running: AtomicBool::new(true),
            stats: StatsCounters::default(),
        });
        (Self { inner }, rx)
    }

    /// Binds a listener and accepts peers on a background thread. Returns the
    /// bound address, which matters when binding port 0.
    pub fn listen<A: ToSocketAddrs>(
        addr: A,
    ) -> io::Result<(Self, Receiver<TransportEvent>, SocketAddr)> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let (transport, events) = Self::new();
        let inner = Arc::clone(&transport.inner);
        thread::Builder::new()
            .name("csm-accept".to_string())
            .spawn(move || accept_loop(listener, inner))?;

        log::info!("Listening on {}", local_addr);
        Ok((transport, events, local_addr))
    }

    /// Opens a single connection. The returned peer id names the remote end.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
    ) -> io::Result<(Self, Receiver<TransportEvent>, PeerId)> {
        let stream = TcpStream::connect(addr)?;
        let (transport, events) = Self::new();
        let peer = Inner::add_peer(&transport.inner, stream)?;
        Ok((transport, events, peer))
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.lock().len()
    }

    pub fn stats(&self) -> NetworkStats {
        self.inner.stats.snapshot()
    }

    /// Stops accepting and closes every peer once its queued frames are out.
    pub fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.peers.lock().clear();
    }
}

impl Transport for TcpTransport {
    fn send_to(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), TransportError> {
        let peers = self.inner.peers.lock();
        let handle = peers.get(&peer).ok_or(TransportError::UnknownPeer(peer))?;
        handle
            .outgoing
            .send(bytes)
            .map_err(|_| TransportError::Closed)
    }

    fn disconnect(&self, peer: PeerId) -> Result<(), TransportError> {
        // Dropping the handle closes the writer queue; the writer flushes what
        // is left and then shuts the socket down.
        self.inner
            .peers
            .lock()
            .remove(&peer)
            .map(|_| ())
            .ok_or(TransportError::UnknownPeer(peer))
    }
}

impl Inner {
    fn add_peer(inner: &Arc<Inner>, stream: TcpStream) -> io::Result<PeerId> {
        let addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;

        let peer = inner.next_peer.fetch_add(1, Ordering::Relaxed);
        let (outgoing, queue) = crossbeam_channel::unbounded();
        inner.peers.lock().insert(peer, PeerHandle { outgoing });
        let _ = inner.events.send(TransportEvent::Connected { peer, addr });
        log::debug!("Peer {} connected from {}", peer, addr);

        let writer_inner = Arc::clone(inner);
        thread::Builder::new()
            .name(format!("csm-write-{peer}"))
            .spawn(move || write_loop(stream, queue, writer_inner))?;

        let reader_inner = Arc::clone(inner);
        thread::Builder::new()
            .name(format!("csm-read-{peer}"))
            .spawn(move || read_loop(peer, read_half, reader_inner))?;

        Ok(peer)
    }
}

fn accept_loop(listener: TcpListener, inner: Arc<Inner>) {
    while inner.running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream
                    .set_nonblocking(false)
                    .and_then(|_| Inner::add_peer(&inner, stream))
                {
                    log::warn!("Failed to set up connection from {}: {}", addr, e);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                log::error!("Accept failed: {}", e);
                break;
            }
        }
    }
    log::debug!("Accept loop stopped");
}

fn write_loop(stream: TcpStream, queue: Receiver<Vec<u8>>, inner: Arc<Inner>) {
    let mut writer = BufWriter::new(&stream);
    for bytes in queue.iter() {
        if let Err(e) = write_frame(&mut writer, &bytes) {
            log::debug!("Write failed: {}", e);
            break;
        }
        inner.stats.record_sent(bytes.len());
    }
    drop(writer);
    let _ = stream.shutdown(Shutdown::Both);
}

fn read_loop(peer: PeerId, stream: TcpStream, inner: Arc<Inner>) {
    let mut reader = BufReader::new(stream);
    let error = loop {
        match read_frame(&mut reader) {
            Ok(bytes) => {
                inner.stats.record_received(bytes.len());
                let _ = inner.events.send(TransportEvent::Received { peer, bytes });
            }
            Err(e) => break e,
        }
    };

    // Still registered means the close did not start on this side.
    let removed_here = inner.peers.lock().remove(&peer).is_some();
    let reason = if !removed_here {
        DisconnectReason::Kicked
    } else if error.kind() == io::ErrorKind::UnexpectedEof {
        DisconnectReason::Graceful
    } else {
        log::debug!("Peer {} read error: {}", peer, error);
        DisconnectReason::Dropped
    };
    let _ = inner
        .events
        .send(TransportEvent::Disconnected { peer, reason });
}
