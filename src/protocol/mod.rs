//! KNXnet/IP protocol implementation.
//!
//! This module contains the wire structures of the tunnelling profile:
//! the frame header and HPAI, the service bodies, cEMI telegrams and the
//! server-side channel table.

pub mod cemi;
pub mod constants;
pub mod frame;
pub mod services;
pub mod tunnel;

pub use cemi::*;
pub use constants::*;
pub use frame::*;
pub use services::*;
pub use tunnel::*;
