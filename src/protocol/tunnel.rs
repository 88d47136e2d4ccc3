//! Server-side tunnelling channel table.
//!
//! Every connected client owns one [`TunnelChannel`] identified by a one-byte
//! channel id. The table hands out the lowest free id in `1..=255`, so an id
//! freed by DISCONNECT is the next one reused.
//!
//! ## Sequence counters
//!
//! ```text
//! client ──TUNNELING_REQUEST(seq = n)──▶ server      recv_seq := n + 1
//! client ◀──TUNNELING_REQUEST(seq = m)── server      send_seq := m + 1
//! ```
//!
//! Both counters wrap modulo 256. A request carrying `recv_seq - 1` is a
//! repetition of the last one: it is acknowledged again but not dispatched.

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Highest channel id the table hands out
pub const MAX_CHANNEL_ID: u8 = 255;

/// One connected tunnelling client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelChannel {
    /// Channel id (1-255)
    pub channel_id: u8,
    /// UDP endpoint that receives data for this channel
    pub client: SocketAddr,
    /// Individual address assigned in the CONNECT_RESPONSE
    pub individual_address: IndividualAddress,
    /// Next sequence number expected from the client
    pub recv_seq: u8,
    /// Next sequence number used towards the client
    pub send_seq: u8,
    /// Last CONNECT, CONNECTIONSTATE or TUNNELING_REQUEST seen
    pub last_activity: Instant,
    received_any: bool,
}

/// Classification of an inbound sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Inbound {
    /// First time this frame is seen, dispatch it
    New,
    /// Repetition of the previous frame, acknowledge only
    Repeated,
}

/// Outbound frame addressing, taken under the table lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    /// Target channel
    pub channel_id: u8,
    /// Sequence number to put into the connection header
    pub sequence: u8,
    /// Where to send the datagram
    pub client: SocketAddr,
}

/// Connected clients of one server, keyed by channel id
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: BTreeMap<u8, TunnelChannel>,
}

impl ChannelTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the lowest free channel id for `client`
    ///
    /// # Errors
    ///
    /// Returns a connection error when all 255 ids are taken.
    pub fn open(
        &mut self,
        client: SocketAddr,
        individual_address: IndividualAddress,
        now: Instant,
    ) -> Result<u8> {
        let channel_id = (1..=MAX_CHANNEL_ID)
            .find(|id| !self.channels.contains_key(id))
            .ok_or_else(KnxError::no_free_channels)?;

        self.channels.insert(
            channel_id,
            TunnelChannel {
                channel_id,
                client,
                individual_address,
                recv_seq: 0,
                send_seq: 0,
                last_activity: now,
                received_any: false,
            },
        );

        Ok(channel_id)
    }

    /// Remove a channel, returning it if it existed
    pub fn close(&mut self, channel_id: u8) -> Option<TunnelChannel> {
        self.channels.remove(&channel_id)
    }

    /// Look up a channel
    pub fn get(&self, channel_id: u8) -> Option<&TunnelChannel> {
        self.channels.get(&channel_id)
    }

    /// Refresh the activity timestamp
    pub fn touch(&mut self, channel_id: u8, now: Instant) -> Result<()> {
        let channel = self.channel_mut(channel_id)?;
        channel.last_activity = now;
        Ok(())
    }

    /// Record an inbound sequence number
    ///
    /// Any number other than the repeated one is accepted and becomes the
    /// new reference, so a client that skipped ahead is resynchronised.
    pub fn accept_inbound(&mut self, channel_id: u8, sequence: u8, now: Instant) -> Result<Inbound> {
        let channel = self.channel_mut(channel_id)?;
        channel.last_activity = now;

        if channel.received_any && sequence == channel.recv_seq.wrapping_sub(1) {
            return Ok(Inbound::Repeated);
        }

        channel.received_any = true;
        channel.recv_seq = sequence.wrapping_add(1);
        Ok(Inbound::New)
    }

    /// Take the next send sequence of one channel
    pub fn next_send(&mut self, channel_id: u8) -> Result<Outbound> {
        let channel = self.channel_mut(channel_id)?;
        Ok(Self::advance(channel))
    }

    /// Take the next send sequence of every channel, in id order
    pub fn next_send_all(&mut self) -> Vec<Outbound> {
        self.channels.values_mut().map(Self::advance).collect()
    }

    /// Remove channels idle for longer than `timeout`
    pub fn evict_idle(&mut self, now: Instant, timeout: Duration) -> Vec<TunnelChannel> {
        let expired: Vec<u8> = self
            .channels
            .values()
            .filter(|channel| now.saturating_duration_since(channel.last_activity) > timeout)
            .map(|channel| channel.channel_id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.channels.remove(&id))
            .collect()
    }

    /// Copy of all channels, in id order
    pub fn snapshot(&self) -> Vec<TunnelChannel> {
        self.channels.values().cloned().collect()
    }

    /// Number of connected channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when nobody is connected
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel_mut(&mut self, channel_id: u8) -> Result<&mut TunnelChannel> {
        self.channels
            .get_mut(&channel_id)
            .ok_or_else(KnxError::channel_not_found)
    }

    fn advance(channel: &mut TunnelChannel) -> Outbound {
        let sequence = channel.send_seq;
        channel.send_seq = sequence.wrapping_add(1);
        Outbound {
            channel_id: channel.channel_id,
            sequence,
            client: channel.client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ia;

    fn client(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_open_allocates_lowest_free_id() {
        let now = Instant::now();
        let mut table = ChannelTable::new();

        assert_eq!(table.open(client(1), ia!(1, 0, 255), now).unwrap(), 1);
        assert_eq!(table.open(client(2), ia!(1, 0, 255), now).unwrap(), 2);
        assert_eq!(table.open(client(3), ia!(1, 0, 255), now).unwrap(), 3);

        assert!(table.close(2).is_some());
        assert_eq!(table.open(client(4), ia!(1, 0, 255), now).unwrap(), 2);
        assert_eq!(table.get(2).unwrap().client, client(4));
    }

    #[test]
    fn test_table_full() {
        let now = Instant::now();
        let mut table = ChannelTable::new();
        for _ in 0..255 {
            table.open(client(1), ia!(1, 0, 255), now).unwrap();
        }
        assert_eq!(table.len(), 255);

        match table.open(client(1), ia!(1, 0, 255), now) {
            Err(KnxError::Connection(e)) => assert!(e.is_no_free_channels()),
            other => panic!("expected a full table, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_channel() {
        let mut table = ChannelTable::new();
        assert!(table.touch(9, Instant::now()).is_err());
        assert!(table.next_send(9).is_err());
        assert!(table.close(9).is_none());
    }

    #[test]
    fn test_recv_seq_tracks_and_wraps() {
        let now = Instant::now();
        let mut table = ChannelTable::new();
        let id = table.open(client(1), ia!(1, 0, 255), now).unwrap();

        for n in 0..300u32 {
            let seq = (n % 256) as u8;
            assert_eq!(table.accept_inbound(id, seq, now).unwrap(), Inbound::New);
            assert_eq!(table.get(id).unwrap().recv_seq, ((n + 1) % 256) as u8);
        }
    }

    #[test]
    fn test_repeated_frame_is_detected() {
        let now = Instant::now();
        let mut table = ChannelTable::new();
        let id = table.open(client(1), ia!(1, 0, 255), now).unwrap();

        assert_eq!(table.accept_inbound(id, 0, now).unwrap(), Inbound::New);
        assert_eq!(table.accept_inbound(id, 0, now).unwrap(), Inbound::Repeated);
        assert_eq!(table.accept_inbound(id, 1, now).unwrap(), Inbound::New);
        assert_eq!(table.get(id).unwrap().recv_seq, 2);
    }

    #[test]
    fn test_first_frame_is_never_a_repeat() {
        let now = Instant::now();
        let mut table = ChannelTable::new();
        let id = table.open(client(1), ia!(1, 0, 255), now).unwrap();

        assert_eq!(table.accept_inbound(id, 255, now).unwrap(), Inbound::New);
        assert_eq!(table.get(id).unwrap().recv_seq, 0);
        assert_eq!(table.accept_inbound(id, 255, now).unwrap(), Inbound::Repeated);
    }

    #[test]
    fn test_send_seq_advances_per_channel() {
        let now = Instant::now();
        let mut table = ChannelTable::new();
        let a = table.open(client(1), ia!(1, 0, 255), now).unwrap();
        let b = table.open(client(2), ia!(1, 0, 255), now).unwrap();

        for expected in 0..=256u32 {
            assert_eq!(table.next_send(a).unwrap().sequence, (expected % 256) as u8);
        }
        let all = table.next_send_all();
        assert_eq!(all.len(), 2);
        assert_eq!((all[0].channel_id, all[0].sequence), (a, 1));
        assert_eq!((all[1].channel_id, all[1].sequence), (b, 0));
    }

    #[test]
    fn test_evict_idle() {
        let start = Instant::now();
        let mut table = ChannelTable::new();
        let stale = table.open(client(1), ia!(1, 0, 255), start).unwrap();
        let fresh = table.open(client(2), ia!(1, 0, 255), start).unwrap();

        let later = start + Duration::from_secs(120);
        table.touch(fresh, later).unwrap();

        let evicted = table.evict_idle(later, Duration::from_secs(60));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].channel_id, stale);
        assert!(table.get(fresh).is_some());
        assert_eq!(table.snapshot().len(), 1);
    }
}
