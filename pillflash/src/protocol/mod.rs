//! Bootloader wire protocol: CRC, packet framing, stream slicing.

pub mod crc;
pub mod framer;
pub mod packet;

// Re-export common types
pub use framer::PacketFramer;
pub use packet::{DEVICE_ID, Opcode, PACKET_LEN, PAYLOAD_LEN, Packet, SYNC_SEQ};
