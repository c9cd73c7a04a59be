use crate::samil::message::{HEADER_LEN, MIN_FRAME_LEN};

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Splits one complete candidate frame out of the receive stream.
///
/// Only the prefix and the declared payload length are used to find the
/// frame boundary; full validation (checksum, routing fields) is left to
/// `Message::from_bytes` so callers can log the raw bytes of a bad frame.
/// Leading bytes that cannot open a frame are discarded one at a time, which
/// lets the link recover from line noise between exchanges.
#[derive(Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameDecoder {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }
            if src[0] != 0x55 || src[1] != 0xaa {
                src.advance(1);
                continue;
            }
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let frame_len = src[8] as usize + MIN_FRAME_LEN;
            if src.len() < frame_len {
                return Ok(None);
            }
            return Ok(Some(src.split_to(frame_len).freeze()));
        }
    }
}
