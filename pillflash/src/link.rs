//! Reliable packet delivery over an unreliable byte stream.
//!
//! A [`PacketLink`] owns the write half of the transport and a background
//! reader thread. The reader thread is the only place raw bytes are
//! consumed: it runs every read through a [`PacketFramer`] and pushes
//! complete packets into an ordered queue. Protocol code never touches the
//! byte stream directly; it either waits for an acknowledgment inside
//! [`PacketLink::send`] or pulls the next protocol packet with
//! [`PacketLink::recv`], never both at once.
//!
//! The bootloader requests a retransmit when a packet arrives with a bad
//! CRC, so the link keeps exactly one packet of retransmission memory: the
//! last packet handed to [`PacketLink::send`].

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::framer::PacketFramer;
use crate::protocol::packet::Packet;

/// Default bound on a blocking wait for a packet.
///
/// Matches the 5-second window the bootloader gives the host between
/// handshake steps before it gives up and boots the application.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Packets buffered between the reader thread and the consumer.
const QUEUE_DEPTH: usize = 16;

/// Read buffer handed to the transport on each poll.
const READ_CHUNK: usize = 256;

/// Reliable, ordered packet channel over a serial byte stream.
pub struct PacketLink<W: Write> {
    writer: W,
    queue: Receiver<Packet>,
    last_sent: Option<Packet>,
    timeout: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<W: Write> PacketLink<W> {
    /// Create a link from the two halves of a transport.
    ///
    /// `reader` moves into a background thread that frames inbound bytes
    /// until the transport reports end-of-stream, fails, or the link is
    /// dropped. A transport read timeout is treated as "no data yet", so
    /// the reader should use a finite timeout to let shutdown proceed.
    pub fn new<R>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(QUEUE_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        thread::spawn(move || read_loop(reader, &tx, &stop));

        Self {
            writer,
            queue: rx,
            last_sent: None,
            timeout: DEFAULT_TIMEOUT,
            shutdown,
        }
    }

    /// Override the blocking-wait bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The current blocking-wait bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write unframed bytes (the sync marker) straight to the transport.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Transmit a packet and block until the device acknowledges it.
    ///
    /// A retransmit request rewrites the exact last-sent bytes and keeps
    /// waiting; retries are not capped. Any other packet in this window is
    /// discarded. Each wait is bounded by the link timeout.
    pub fn send(&mut self, packet: Packet) -> Result<()> {
        self.writer.write_all(packet.as_bytes())?;
        self.writer.flush()?;
        self.last_sent = Some(packet);

        loop {
            let reply = self.recv_within(self.timeout)?;
            if reply == Packet::ack() {
                trace!("Ack received");
                return Ok(());
            } else if reply == Packet::retransmit_request() {
                debug!("Retransmit requested, resending last packet");
                if let Some(ref last) = self.last_sent {
                    self.writer.write_all(last.as_bytes())?;
                    self.writer.flush()?;
                }
            } else {
                // No other packet type is legal while an ack is pending.
                trace!("Dropping packet in ack window: {:02X?}", reply.payload());
            }
        }
    }

    /// Pull the next packet from the receive queue.
    pub fn recv(&mut self) -> Result<Packet> {
        self.recv_within(self.timeout)
    }

    /// Pull the next packet, waiting at most `timeout`.
    pub fn recv_within(&mut self, timeout: Duration) -> Result<Packet> {
        match self.queue.recv_timeout(timeout) {
            Ok(packet) => Ok(packet),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout(format!(
                "no packet within {} ms",
                timeout.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Error::LinkClosed),
        }
    }
}

impl<W: Write> Drop for PacketLink<W> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn read_loop<R: Read>(mut reader: R, queue: &SyncSender<Packet>, shutdown: &AtomicBool) {
    let mut framer = PacketFramer::new();
    let mut buf = [0u8; READ_CHUNK];

    while !shutdown.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for packet in framer.push(&buf[..n]) {
                    if queue.send(packet).is_err() {
                        // Consumer side of the link is gone.
                        return;
                    }
                }
            },
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {},
            Err(e) => {
                debug!("Transport reader stopped: {e}");
                break;
            },
        }
    }
}
