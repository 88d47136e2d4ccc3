//! DPT 1.xxx - Boolean (1-bit) and DPT 2.xxx - Controlled Boolean (2-bit)
//!
//! ## Format
//!
//! ```text
//! DPT 1:  0000 000B      B = value
//! DPT 2:  0000 00CB      C = control, B = value
//! ```
//!
//! Both fit into the six spare bits of the APCI byte, so they always travel
//! in the compact cEMI form.
//!
//! ## Common Subtypes
//!
//! - **1.001** - Switch (off/on)
//! - **1.008** - UpDown (up/down)
//! - **1.018** - Occupancy (not occupied/occupied)
//! - **2.001** - Switch control

use crate::dpt::{DptDecode, DptEncode};
use crate::error::{KnxError, Result};

/// DPT 1.xxx boolean codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boolean;

impl DptEncode<bool> for Boolean {
    fn encode(&self, value: bool, buf: &mut [u8]) -> Result<usize> {
        let slot = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
        *slot = u8::from(value);
        Ok(1)
    }
}

impl DptDecode<bool> for Boolean {
    #[inline]
    fn decode(&self, data: &[u8]) -> Result<bool> {
        let byte = data.first().ok_or_else(KnxError::invalid_dpt_data)?;
        Ok(byte & 0x01 != 0)
    }
}

/// DPT 2.xxx controlled boolean codec, values are `(control, value)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlBoolean;

impl DptEncode<(bool, bool)> for ControlBoolean {
    fn encode(&self, (control, value): (bool, bool), buf: &mut [u8]) -> Result<usize> {
        let slot = buf.first_mut().ok_or_else(KnxError::buffer_too_small)?;
        *slot = (u8::from(control) << 1) | u8::from(value);
        Ok(1)
    }
}

impl DptDecode<(bool, bool)> for ControlBoolean {
    fn decode(&self, data: &[u8]) -> Result<(bool, bool)> {
        let byte = data.first().ok_or_else(KnxError::invalid_dpt_data)?;
        Ok((byte & 0x02 != 0, byte & 0x01 != 0))
    }
}
