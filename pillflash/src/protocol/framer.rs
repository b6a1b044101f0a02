//! Inbound byte-stream framing.
//!
//! A serial read can end anywhere: mid-packet, mid-length-byte, or after
//! several packets at once. The framer accumulates whatever arrives and
//! slices off complete 18-byte packets in wire order, keeping any partial
//! tail for the next read.

use crate::protocol::packet::{PACKET_LEN, Packet};

/// Accumulates raw bytes and yields complete [`Packet`]s.
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: Vec<u8>,
}

impl PacketFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of received bytes and collect every packet it completes.
    ///
    /// Packets come out in the exact order their bytes arrived. Bytes that
    /// do not yet form a full packet stay buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        while self.buffer.len() >= PACKET_LEN {
            let mut raw = [0u8; PACKET_LEN];
            raw.copy_from_slice(&self.buffer[..PACKET_LEN]);
            self.buffer.drain(..PACKET_LEN);
            packets.push(Packet::from_bytes(raw));
        }
        packets
    }

    /// Number of buffered bytes not yet forming a complete packet.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::Opcode;

    fn wire(packets: &[Packet]) -> Vec<u8> {
        packets
            .iter()
            .flat_map(|p| p.as_bytes().iter().copied())
            .collect()
    }

    #[test]
    fn test_framer_single_exact_packet() {
        let packet = Packet::command(Opcode::SeqObserved);
        let mut framer = PacketFramer::new();
        let out = framer.push(packet.as_bytes());
        assert_eq!(out, vec![packet]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_framer_byte_at_a_time() {
        let packets = [
            Packet::command(Opcode::SeqObserved),
            Packet::command(Opcode::UpdateRequest),
            Packet::new(&[0x36, 0x00, 0x00, 0x12, 0x34]).unwrap(),
        ];
        let bytes = wire(&packets);

        let mut framer = PacketFramer::new();
        let mut out = Vec::new();
        for byte in bytes {
            out.extend(framer.push(&[byte]));
        }

        assert_eq!(out, packets);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_framer_single_oversized_chunk() {
        let packets = [
            Packet::ack(),
            Packet::command(Opcode::ReadyForData),
            Packet::ack(),
            Packet::command(Opcode::UpdateSuccess),
        ];
        let mut framer = PacketFramer::new();
        let out = framer.push(&wire(&packets));
        assert_eq!(out, packets);
    }

    #[test]
    fn test_framer_keeps_partial_tail() {
        let first = Packet::command(Opcode::SeqObserved);
        let second = Packet::command(Opcode::UpdateRequest);
        let mut bytes = wire(&[first, second]);
        let tail = bytes.split_off(PACKET_LEN + 5);

        let mut framer = PacketFramer::new();
        let out = framer.push(&bytes);
        assert_eq!(out, vec![first]);
        assert_eq!(framer.pending(), 5);

        let out = framer.push(&tail);
        assert_eq!(out, vec![second]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_framer_preserves_order_across_uneven_chunks() {
        let packets: Vec<Packet> = (0u8..6).map(|i| Packet::new(&[0x40, i]).unwrap()).collect();
        let bytes = wire(&packets);

        let mut framer = PacketFramer::new();
        let mut out = Vec::new();
        for chunk in bytes.chunks(7) {
            out.extend(framer.push(chunk));
        }
        assert_eq!(out, packets);
    }
}
