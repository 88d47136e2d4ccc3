//! DPT 16.xxx - 14-character string
//!
//! Always exactly 14 bytes on the wire, NUL-padded. 16.000 is ASCII and
//! 16.001 is ISO 8859-1; both decode through Latin-1 here since ASCII is a
//! subset. Characters outside Latin-1 encode as `?`.

use crate::dpt::{DptDecode, DptEncode, MAX_DPT_SIZE};
use crate::error::{KnxError, Result};

/// DPT 16.xxx codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Text;

impl Text {
    /// Encoded width
    pub const SIZE: usize = MAX_DPT_SIZE;
}

impl DptEncode<&str> for Text {
    fn encode(&self, value: &str, buf: &mut [u8]) -> Result<usize> {
        let slot = buf
            .get_mut(..Self::SIZE)
            .ok_or_else(KnxError::buffer_too_small)?;
        slot.fill(0);
        for (byte, c) in slot.iter_mut().zip(value.chars()) {
            *byte = u8::try_from(u32::from(c)).unwrap_or(b'?');
        }
        Ok(Self::SIZE)
    }
}

impl DptDecode<heapless::String<MAX_DPT_SIZE>> for Text {
    fn decode(&self, data: &[u8]) -> Result<heapless::String<MAX_DPT_SIZE>> {
        // Peers occasionally send short strings without padding
        if data.is_empty() {
            return Err(KnxError::invalid_dpt_data());
        }
        let raw = &data[..data.len().min(Self::SIZE)];
        let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);

        let mut out = heapless::String::new();
        for byte in &raw[..end] {
            // Non-ASCII Latin-1 needs two UTF-8 bytes; stop when full
            if out.push(char::from(*byte)).is_err() {
                break;
            }
        }
        Ok(out)
    }
}
