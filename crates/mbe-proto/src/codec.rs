//! Segmentation and reassembly of messages over 8-byte CAN frames
//!
//! This is the cut-down ISO-TP dialect spoken by MBE ECUs: single frames,
//! first frames and consecutive frames only. There are no flow-control
//! frames, no padding negotiation and only one message in flight.
//!
//! ```text
//! single frame       [0x0L] [payload x L]                 L <= 7
//! first frame        [0x1H] [LL] [payload x 6]            length = H << 8 | LL
//! consecutive frame  [0x2N] [payload x 7]                 N = sequence & 0xF
//! ```

use thiserror::Error;
use tracing::debug;

use crate::frame::{FramePayload, FRAME_SIZE};

/// Largest message the 12-bit length field can describe
pub const MAX_MESSAGE_SIZE: usize = 4095;

const SINGLE_FRAME: u8 = 0x00;
const FIRST_FRAME: u8 = 0x10;
const CONSECUTIVE_FRAME: u8 = 0x20;

const SINGLE_FRAME_DATA: usize = 7;
const FIRST_FRAME_DATA: usize = 6;
const CONSECUTIVE_FRAME_DATA: usize = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid message size: {0}")]
    Size(usize),

    #[error("Bad frame type: 0x{0:X}")]
    BadFrameType(u8),
}

/// Split a message into frame payloads
///
/// Consecutive frame indices start at 1 and wrap modulo 16 without ever
/// resetting mid-message.
pub fn encode(message: &[u8]) -> Result<Vec<FramePayload>, CodecError> {
    let size = message.len();
    if size == 0 || size > MAX_MESSAGE_SIZE {
        return Err(CodecError::Size(size));
    }

    if size <= SINGLE_FRAME_DATA {
        let mut data = [0u8; FRAME_SIZE];
        data[0] = SINGLE_FRAME | size as u8;
        data[1..=size].copy_from_slice(message);
        return Ok(vec![FramePayload {
            data,
            len: size as u8 + 1,
        }]);
    }

    let remaining = size - FIRST_FRAME_DATA;
    let mut frames = Vec::with_capacity(1 + remaining.div_ceil(CONSECUTIVE_FRAME_DATA));

    let mut data = [0u8; FRAME_SIZE];
    data[0] = FIRST_FRAME | (size >> 8) as u8;
    data[1] = (size & 0xFF) as u8;
    data[2..].copy_from_slice(&message[..FIRST_FRAME_DATA]);
    frames.push(FramePayload {
        data,
        len: FRAME_SIZE as u8,
    });

    for (n, chunk) in message[FIRST_FRAME_DATA..]
        .chunks(CONSECUTIVE_FRAME_DATA)
        .enumerate()
    {
        let mut data = [0u8; FRAME_SIZE];
        data[0] = CONSECUTIVE_FRAME | ((n + 1) & 0x0F) as u8;
        data[1..=chunk.len()].copy_from_slice(chunk);
        frames.push(FramePayload {
            data,
            len: FRAME_SIZE as u8,
        });
    }

    Ok(frames)
}

/// Reassembly state for one connection
///
/// Feed frames in arrival order; a completed message is handed back once the
/// accumulated length reaches the declared length. A new single or first
/// frame always starts over, discarding any partial message.
#[derive(Debug)]
pub struct Reassembler {
    buf: Vec<u8>,
    /// Declared message length
    size: usize,
    /// Expected next consecutive frame index
    next: u8,
    in_progress: bool,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(MAX_MESSAGE_SIZE),
            size: 0,
            next: 0,
            in_progress: false,
        }
    }

    /// Declared length of the message being assembled
    pub fn expected_len(&self) -> usize {
        self.size
    }

    /// Bytes accumulated so far
    pub fn received_len(&self) -> usize {
        self.buf.len()
    }

    /// Index the next consecutive frame must carry
    pub fn next_index(&self) -> u8 {
        self.next
    }

    /// Whether a multi-frame message is partially assembled
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Consume one frame, returning the message if it is now complete
    ///
    /// Consecutive frames carrying the wrong index (or arriving with no
    /// message in progress) are dropped without touching the state.
    pub fn feed(&mut self, frame: &[u8; FRAME_SIZE]) -> Result<Option<Vec<u8>>, CodecError> {
        let pci = frame[0];
        match pci & 0xF0 {
            SINGLE_FRAME => {
                let size = usize::from(pci & 0x0F).min(SINGLE_FRAME_DATA);
                self.buf.clear();
                self.buf.extend_from_slice(&frame[1..=size]);
                self.size = size;
                self.next = 0;
                self.in_progress = true;
            }
            FIRST_FRAME => {
                let size = (usize::from(pci & 0x0F) << 8) | usize::from(frame[1]);
                let n = size.min(FIRST_FRAME_DATA);
                self.buf.clear();
                self.buf.extend_from_slice(&frame[2..2 + n]);
                self.size = size;
                self.next = 1;
                self.in_progress = true;
            }
            CONSECUTIVE_FRAME => {
                let index = pci & 0x0F;
                if !self.in_progress || index != self.next {
                    debug!(
                        index,
                        expected = self.next,
                        in_progress = self.in_progress,
                        "Dropping out-of-sequence consecutive frame"
                    );
                    return Ok(None);
                }
                let n = (self.size - self.buf.len()).min(CONSECUTIVE_FRAME_DATA);
                self.buf.extend_from_slice(&frame[1..1 + n]);
                self.next = (self.next + 1) & 0x0F;
            }
            other => return Err(CodecError::BadFrameType(other >> 4)),
        }

        if self.buf.len() >= self.size {
            self.in_progress = false;
            self.next = 0;
            return Ok(Some(std::mem::take(&mut self.buf)));
        }
        Ok(None)
    }
}
