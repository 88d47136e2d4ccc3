#![doc = include_str!("../README.md")]

//! ## Crate layout
//!
//! - [`addressing`]: individual and group addresses
//! - [`protocol`]: KNXnet/IP frames, services, cEMI and the channel table
//! - [`dpt`]: datapoint type codecs and their registry
//! - [`device`]: simulated devices
//! - [`premise`]: telegram dispatch and the premise runtime
//! - [`knx_server`]: the tunnelling server
//! - [`net`]: UDP and in-memory transports
//! - [`scenario`]: periodic value drivers
//! - [`inspector`]: telegram history
//! - [`configuration`]: TOML configuration
//!
//! ## Example
//!
//! ```rust
//! use knx_sim::premise::Dispatcher;
//! use knx_sim::device::DeviceSpec;
//! use knx_sim::protocol::CemiFrame;
//! use knx_sim::{ga, group_objects, ia};
//!
//! let mut bus = Dispatcher::new("home");
//! let objects = group_objects! { "switch_cmd" => 1/0/1, "switch_status" => 1/0/2 };
//! bus.create_device("light_switch", DeviceSpec::new("light-1", ia!(1, 1, 1), objects))?;
//!
//! let write = CemiFrame::group_write(ia!(1, 0, 255), ga!(1/0/1), &[0x01])?;
//! let responses = bus.dispatch(&write);
//! assert_eq!(responses[0].group_address(), Some(ga!(1/0/2)));
//! # Ok::<(), knx_sim::KnxError>(())
//! ```

// Macro modules (must be declared before use)
#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod addressing;
pub mod configuration;
pub mod device;
pub mod dpt;
pub mod error;
pub mod inspector;
pub mod knx_server;
pub mod net;
pub mod premise;
pub mod protocol;
pub mod scenario;
pub mod utility;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::{GroupAddress, IndividualAddress};
#[doc(inline)]
pub use configuration::{PremiseConfig, SimConfig};
#[doc(inline)]
pub use device::{Device, DeviceSpec};
#[doc(inline)]
pub use dpt::DptValue;
#[doc(inline)]
pub use error::{KnxError, Result};
#[doc(inline)]
pub use inspector::TelegramInspector;
#[doc(inline)]
pub use knx_server::TunnelServer;
#[doc(inline)]
pub use premise::{Dispatcher, Premise, TelegramEvent};
