//! Bootloader update state machine.
//!
//! Drives a connected bootloader through synchronization, the update
//! handshake, metadata exchange, erase, chunked firmware transfer, and the
//! final success confirmation. The exchange is strictly alternating: the
//! bootloader runs a single-threaded command interpreter, so every step
//! either waits for exactly one packet or reliably sends exactly one packet.
//! No pipelining is attempted; recovery relies entirely on the ack/
//! retransmit layer underneath.

use std::io::Write;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, WriteBytesExt};
use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::link::PacketLink;
use crate::protocol::packet::{DEVICE_ID, Opcode, PAYLOAD_LEN, Packet, SYNC_SEQ};

/// Window for the initial synchronization exchange.
///
/// The bootloader listens for the sync marker for 10 seconds after reset
/// before it gives up and boots the application.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between sync marker retransmissions while synchronizing.
const SYNC_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Bound on the wait for the post-erase ready packet.
///
/// Erasing the application pages takes much longer than any other step.
pub const ERASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake and transfer states, in protocol order.
///
/// Every state either awaits one packet or sends one packet;
/// [`UpdateState::ReceiveFirmware`] loops until the image is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Send the sync marker until the device reports it observed it.
    Sync,
    /// Await the device's update request.
    SendUpdateReq,
    /// Reliably send the update response.
    WaitForUpdateRes,
    /// Await the device-ID request.
    DeviceIdReq,
    /// Reliably send the device-ID response.
    DeviceIdRes,
    /// Await the firmware-length request.
    FwLengthReq,
    /// Reliably send the firmware length.
    FwLengthRes,
    /// Await the ready packet that follows the device-side erase.
    EraseApplication,
    /// Send firmware chunks, pacing on ready packets.
    ReceiveFirmware,
    /// Await the final success confirmation.
    UpdateSuccess,
}

/// A single firmware update session.
///
/// Created per transfer, consumed on success or failure. Holds the link,
/// the borrowed firmware bytes, and the transfer cursor.
pub struct Updater<'a, W: Write> {
    link: PacketLink<W>,
    firmware: &'a [u8],
    offset: usize,
    state: UpdateState,
}

impl<'a, W: Write> Updater<'a, W> {
    /// Create an update session for `firmware`.
    ///
    /// The image length is transmitted in a 4-byte field, so images past
    /// `u32::MAX` bytes are rejected up front.
    pub fn new(link: PacketLink<W>, firmware: &'a [u8]) -> Result<Self> {
        if firmware.is_empty() {
            return Err(Error::InvalidImage("image is empty".into()));
        }
        if u32::try_from(firmware.len()).is_err() {
            return Err(Error::InvalidImage(format!(
                "image is {} bytes, length field is 32-bit",
                firmware.len()
            )));
        }

        Ok(Self {
            link,
            firmware,
            offset: 0,
            state: UpdateState::Sync,
        })
    }

    /// The state the session is currently in.
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Bytes of firmware transmitted so far.
    pub fn bytes_sent(&self) -> usize {
        self.offset
    }

    /// Run the session to completion.
    ///
    /// `progress` is called after every transmitted chunk with
    /// `(bytes_sent, total)`. Returns once the device confirms the update;
    /// any deviation during the transfer aborts with an error and sends
    /// nothing further.
    pub fn run(&mut self, progress: &mut dyn FnMut(usize, usize)) -> Result<()> {
        let total = self.firmware.len();

        loop {
            if self.state != UpdateState::ReceiveFirmware {
                debug!("State: {:?}", self.state);
            }

            self.state = match self.state {
                UpdateState::Sync => {
                    self.synchronize()?;
                    UpdateState::SendUpdateReq
                },

                UpdateState::SendUpdateReq => {
                    self.await_command(Opcode::UpdateRequest, self.link.timeout())?;
                    UpdateState::WaitForUpdateRes
                },

                UpdateState::WaitForUpdateRes => {
                    self.link.send(Packet::command(Opcode::UpdateResponse))?;
                    UpdateState::DeviceIdReq
                },

                UpdateState::DeviceIdReq => {
                    self.await_command(Opcode::DeviceIdRequest, self.link.timeout())?;
                    UpdateState::DeviceIdRes
                },

                UpdateState::DeviceIdRes => {
                    let packet = Packet::new(&[Opcode::DeviceIdResponse as u8, DEVICE_ID])?;
                    self.link.send(packet)?;
                    UpdateState::FwLengthReq
                },

                UpdateState::FwLengthReq => {
                    self.await_command(Opcode::FwLengthRequest, self.link.timeout())?;
                    UpdateState::FwLengthRes
                },

                UpdateState::FwLengthRes => {
                    self.link.send(self.length_packet()?)?;
                    UpdateState::EraseApplication
                },

                UpdateState::EraseApplication => {
                    self.await_command(Opcode::ReadyForData, ERASE_TIMEOUT)?;
                    UpdateState::ReceiveFirmware
                },

                UpdateState::ReceiveFirmware => {
                    if crate::is_interrupt_requested() {
                        return Err(Error::Interrupted);
                    }

                    let end = (self.offset + PAYLOAD_LEN).min(total);
                    self.link.send(Packet::new(&self.firmware[self.offset..end])?)?;
                    self.offset = end;
                    progress(self.offset, total);

                    if self.offset < total {
                        // The device writes the chunk to flash and signals
                        // readiness before the next one. Anything else here
                        // is fatal; the transfer cannot be resumed.
                        let reply = self.link.recv()?;
                        if reply.matches(Opcode::UpdateFailed) {
                            return Err(Error::DeviceFailure);
                        }
                        if !reply.matches(Opcode::ReadyForData) {
                            return Err(Error::UnexpectedPacket {
                                during: "firmware transfer",
                            });
                        }
                        trace!("Bytes remaining: {}", total - self.offset);
                        UpdateState::ReceiveFirmware
                    } else {
                        UpdateState::UpdateSuccess
                    }
                },

                UpdateState::UpdateSuccess => {
                    self.await_command(Opcode::UpdateSuccess, self.link.timeout())?;
                    info!("Firmware update completed ({total} bytes)");
                    return Ok(());
                },
            };
        }
    }

    /// Repeat the sync marker until the device reports it observed it.
    fn synchronize(&mut self) -> Result<()> {
        let deadline = Instant::now() + SYNC_TIMEOUT;

        loop {
            self.link.write_raw(&SYNC_SEQ)?;

            match self.link.recv_within(SYNC_RETRY_INTERVAL) {
                Ok(packet) if packet.matches(Opcode::SeqObserved) => {
                    debug!("Sync observed by device");
                    return Ok(());
                },
                Ok(packet) if packet.matches(Opcode::UpdateFailed) => {
                    return Err(Error::DeviceFailure);
                },
                Ok(packet) => {
                    trace!("Ignoring packet during sync: {:02X?}", packet.payload());
                },
                Err(Error::Timeout(_)) => {},
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                return Err(Error::Timeout("device never observed sync marker".into()));
            }
        }
    }

    /// Wait for the single-byte packet carrying `opcode`.
    ///
    /// Non-matching packets are discarded; a device-side failure report
    /// aborts immediately.
    fn await_command(&mut self, opcode: Opcode, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(format!("waiting for {opcode:?}")));
            }

            let packet = self.link.recv_within(remaining)?;
            if packet.matches(opcode) {
                return Ok(());
            }
            if packet.matches(Opcode::UpdateFailed) {
                return Err(Error::DeviceFailure);
            }
            trace!(
                "Ignoring packet while waiting for {opcode:?}: {:02X?}",
                packet.payload()
            );
        }
    }

    /// Build the firmware-length response: opcode + 4-byte big-endian length.
    fn length_packet(&self) -> Result<Packet> {
        let mut payload = Vec::with_capacity(5);
        payload.push(Opcode::FwLengthResponse as u8);
        #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
        #[allow(clippy::cast_possible_truncation)] // checked in new()
        payload
            .write_u32::<BigEndian>(self.firmware.len() as u32)
            .unwrap();
        Packet::new(&payload)
    }
}
