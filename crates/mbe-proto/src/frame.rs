//! CAN frame types shared by the codec and the transports

/// Payload bytes carried by a classic CAN frame
pub const FRAME_SIZE: usize = 8;

/// One segment produced by the codec, before it is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePayload {
    /// Frame data, zero padded
    pub data: [u8; FRAME_SIZE],
    /// Data length code to put on the wire
    pub len: u8,
}

impl FramePayload {
    /// The bytes that go on the wire
    pub fn bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }
}

/// A CAN frame as exchanged with a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// CAN identifier (11 or 29 bit)
    pub id: u32,
    /// Whether `id` is a 29-bit extended identifier
    pub extended: bool,
    /// Frame data, zero padded past `len`
    pub data: [u8; FRAME_SIZE],
    /// Data length code
    pub len: u8,
}

impl Frame {
    /// Address a codec segment with an extended identifier
    pub fn new(id: u32, payload: FramePayload) -> Self {
        Self {
            id,
            extended: true,
            data: payload.data,
            len: payload.len,
        }
    }

    /// Build a frame from raw bytes, truncating anything past 8 bytes
    pub fn from_bytes(id: u32, extended: bool, bytes: &[u8]) -> Self {
        let len = bytes.len().min(FRAME_SIZE);
        let mut data = [0u8; FRAME_SIZE];
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            id,
            extended,
            data,
            len: len as u8,
        }
    }

    /// The bytes that were on the wire
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(FRAME_SIZE)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_pads_and_truncates() {
        let short = Frame::from_bytes(0x123, false, &[1, 2, 3]);
        assert_eq!(short.data, [1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(short.payload(), &[1, 2, 3]);

        let long = Frame::from_bytes(0x123, true, &[9; 12]);
        assert_eq!(long.len, 8);
        assert_eq!(long.payload(), &[9; 8]);
    }

    #[test]
    fn test_new_uses_extended_id() {
        let payload = FramePayload {
            data: [0x03, 0x04, 0x00, 0x0D, 0, 0, 0, 0],
            len: 4,
        };
        let frame = Frame::new(0x0CBE1101, payload);
        assert!(frame.extended);
        assert_eq!(frame.payload(), payload.bytes());
    }
}
