//! Telegram history.
//!
//! [`TelegramInspector`] keeps the most recent telegrams of every premise in
//! a bounded ring buffer. Attach it to a premise with
//! [`TelegramInspector::observer`]:
//!
//! ```rust
//! use knx_sim::inspector::TelegramInspector;
//! use knx_sim::premise::Dispatcher;
//! use std::sync::Arc;
//!
//! let inspector = Arc::new(TelegramInspector::new(100));
//! let mut dispatcher = Dispatcher::new("home");
//! dispatcher.subscribe(inspector.observer());
//! assert_eq!(inspector.stats(None).total_recorded, 0);
//! ```

use crate::dpt::{self, DptValue};
use crate::premise::{TelegramDirection, TelegramEvent};
use crate::utility::lock;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

/// Telegrams kept per premise unless configured otherwise
pub const DEFAULT_CAPACITY: usize = 1000;

/// One recorded telegram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelegramRecord {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Premise id
    pub premise: String,
    /// `rx` or `tx`
    pub direction: &'static str,
    /// Sender address
    pub source: String,
    /// Group or individual destination
    pub destination: String,
    /// APCI name
    pub apci: &'static str,
    /// Raw payload as hex
    pub payload: String,
    /// Device bound to the destination
    pub device_id: Option<String>,
    /// Group object name on that device
    pub group_object: Option<String>,
    /// DPT of that group object
    pub dpt: Option<String>,
    /// Decoded payload
    pub value: Option<DptValue>,
    /// Unit of the DPT
    pub unit: Option<&'static str>,
}

impl From<&TelegramEvent> for TelegramRecord {
    fn from(event: &TelegramEvent) -> Self {
        let timestamp = event
            .timestamp
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let mut payload = String::with_capacity(event.frame.payload.len() * 2);
        for byte in &event.frame.payload {
            let _ = write!(payload, "{byte:02x}");
        }

        Self {
            timestamp,
            premise: event.premise.clone(),
            direction: match event.direction {
                TelegramDirection::Inbound => "rx",
                TelegramDirection::Outbound => "tx",
            },
            source: event.frame.source.to_string(),
            destination: event.frame.destination.to_string(),
            apci: event.frame.apci.name(),
            payload,
            device_id: event.device_id.clone(),
            group_object: event.group_object.clone(),
            dpt: event.dpt.clone(),
            value: event.value.clone(),
            unit: event
                .dpt
                .as_deref()
                .and_then(dpt::lookup)
                .map(|info| info.unit)
                .filter(|unit| !unit.is_empty()),
        }
    }
}

/// Inspector counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectorStats {
    /// Telegrams recorded since start, including evicted ones
    pub total_recorded: u64,
    /// Telegrams currently held, per premise
    pub premises: BTreeMap<String, usize>,
    /// Per-premise capacity
    pub buffer_max: usize,
}

/// Bounded per-premise telegram history
#[derive(Debug)]
pub struct TelegramInspector {
    capacity: usize,
    buffers: Mutex<BTreeMap<String, VecDeque<TelegramRecord>>>,
    total: AtomicU64,
}

impl Default for TelegramInspector {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TelegramInspector {
    /// Inspector holding at most `capacity` telegrams per premise
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffers: Mutex::new(BTreeMap::new()),
            total: AtomicU64::new(0),
        }
    }

    /// Append `event`, dropping the oldest telegram of its premise when full
    pub fn record(&self, event: &TelegramEvent) {
        let record = TelegramRecord::from(event);
        let mut buffers = lock(&self.buffers);
        let buffer = buffers.entry(record.premise.clone()).or_default();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(record);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Newest-first history of `premise`, skipping `offset` and returning
    /// at most `limit` records
    pub fn history(&self, premise: &str, limit: usize, offset: usize) -> Vec<TelegramRecord> {
        lock(&self.buffers)
            .get(premise)
            .map(|buffer| buffer.iter().rev().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Counters, for one premise or all
    pub fn stats(&self, premise: Option<&str>) -> InspectorStats {
        let buffers = lock(&self.buffers);
        let premises = buffers
            .iter()
            .filter(|(id, _)| premise.map_or(true, |p| p == id.as_str()))
            .map(|(id, buffer)| (id.clone(), buffer.len()))
            .collect();
        InspectorStats {
            total_recorded: self.total.load(Ordering::Relaxed),
            premises,
            buffer_max: self.capacity,
        }
    }

    /// Forget the history of one premise or of all
    pub fn clear(&self, premise: Option<&str>) {
        let mut buffers = lock(&self.buffers);
        match premise {
            Some(id) => {
                buffers.remove(id);
            }
            None => buffers.clear(),
        }
    }

    /// Observer feeding this inspector, for [`Dispatcher::subscribe`]
    ///
    /// [`Dispatcher::subscribe`]: crate::premise::Dispatcher::subscribe
    pub fn observer(self: &Arc<Self>) -> impl Fn(&TelegramEvent) + Send + Sync + 'static {
        let inspector = Arc::clone(self);
        move |event| inspector.record(event)
    }
}
