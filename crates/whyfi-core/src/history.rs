// ── Rolling telemetry history ──
//
// Fixed-capacity ring buffers, one per numeric telemetry channel. Only the
// poller task writes; consumers receive cloned snapshots.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use strum::{AsRefStr, EnumCount, EnumIter, IntoEnumIterator};

use crate::model::MetricSnapshot;

// ── RingBuffer ──────────────────────────────────────────────────────

/// Bounded FIFO that overwrites its oldest element once full.
///
/// Storage never exceeds `capacity` elements no matter how many values are
/// pushed. Iteration is always oldest to newest.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    /// Index of the oldest element once the buffer is full; 0 before that.
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
            return;
        }
        if let Some(slot) = self.buf.get_mut(self.head) {
            *slot = value;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently pushed value.
    pub fn last(&self) -> Option<&T> {
        if self.buf.len() < self.capacity {
            self.buf.last()
        } else {
            self.buf.get((self.head + self.capacity - 1) % self.capacity)
        }
    }

    /// Oldest-first iterator over the retained values.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        let (wrapped, oldest) = self.buf.split_at(self.head);
        oldest.iter().chain(wrapped.iter())
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the retained values, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

// ── Channel ─────────────────────────────────────────────────────────

/// A numeric telemetry series tracked in history.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    EnumIter,
    EnumCount,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Channel {
    LinkRate,
    Signal,
    Noise,
    RouterPing,
    RouterJitter,
    RouterLoss,
    InternetPing,
    InternetJitter,
    InternetLoss,
    DnsLookup,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Self::LinkRate => "Link Rate",
            Self::Signal => "Signal Strength",
            Self::Noise => "Noise Level",
            Self::RouterPing => "Router Latency",
            Self::RouterJitter => "Router Jitter",
            Self::RouterLoss => "Router Packet Loss",
            Self::InternetPing => "Internet Latency",
            Self::InternetJitter => "Internet Jitter",
            Self::InternetLoss => "Internet Packet Loss",
            Self::DnsLookup => "DNS Lookup",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::LinkRate => "Mbps",
            Self::Signal | Self::Noise => "dBm",
            Self::RouterLoss | Self::InternetLoss => "%",
            Self::RouterPing
            | Self::RouterJitter
            | Self::InternetPing
            | Self::InternetJitter
            | Self::DnsLookup => "ms",
        }
    }

    /// Signal and noise are stored as positive magnitudes of a dBm reading.
    pub fn stores_magnitude(self) -> bool {
        matches!(self, Self::Signal | Self::Noise)
    }

    /// The value this channel records for one snapshot. Absent readings
    /// are recorded as 0.
    pub fn reading(self, snap: &MetricSnapshot) -> f64 {
        let magnitude = |dbm: Option<i32>| dbm.map(|d| f64::from(d.unsigned_abs()));
        let value = match self {
            Self::LinkRate => snap.wifi.link_rate_mbps,
            Self::Signal => magnitude(snap.wifi.signal_dbm),
            Self::Noise => magnitude(snap.wifi.noise_dbm),
            Self::RouterPing => snap.router_ping.and_then(|p| p.latency_ms),
            Self::RouterJitter => snap.router_ping.and_then(|p| p.jitter_ms),
            Self::RouterLoss => snap.router_ping.and_then(|p| p.packet_loss_percent),
            Self::InternetPing => snap.internet_ping.and_then(|p| p.latency_ms),
            Self::InternetJitter => snap.internet_ping.and_then(|p| p.jitter_ms),
            Self::InternetLoss => snap.internet_ping.and_then(|p| p.packet_loss_percent),
            Self::DnsLookup => snap.dns.lookup_latency_ms,
        };
        value.unwrap_or(0.0)
    }

    fn index(self) -> usize {
        match self {
            Self::LinkRate => 0,
            Self::Signal => 1,
            Self::Noise => 2,
            Self::RouterPing => 3,
            Self::RouterJitter => 4,
            Self::RouterLoss => 5,
            Self::InternetPing => 6,
            Self::InternetJitter => 7,
            Self::InternetLoss => 8,
            Self::DnsLookup => 9,
        }
    }
}

// ── MetricHistory ───────────────────────────────────────────────────

/// One ring buffer per [`Channel`], all sharing the same capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricHistory {
    channels: [RingBuffer<f64>; Channel::COUNT],
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| RingBuffer::new(capacity)),
        }
    }

    fn buffer(&self, channel: Channel) -> &RingBuffer<f64> {
        // `index()` is exhaustive over `Channel::COUNT` variants.
        &self.channels[channel.index()]
    }

    pub fn push(&mut self, channel: Channel, value: f64) {
        self.channels[channel.index()].push(value);
    }

    /// Retained values for `channel`, oldest first.
    pub fn snapshot(&self, channel: Channel) -> Vec<f64> {
        self.buffer(channel).to_vec()
    }

    /// The most recent `n` values for `channel`, oldest first.
    pub fn tail(&self, channel: Channel, n: usize) -> Vec<f64> {
        let buf = self.buffer(channel);
        buf.iter().skip(buf.len().saturating_sub(n)).copied().collect()
    }

    pub fn latest(&self, channel: Channel) -> Option<f64> {
        self.buffer(channel).last().copied()
    }

    /// Push one value per channel from a successful poll.
    pub fn record(&mut self, snap: &MetricSnapshot) {
        for channel in Channel::iter() {
            self.push(channel, channel.reading(snap));
        }
    }

    /// Number of retained samples in one channel.
    pub fn len_of(&self, channel: Channel) -> usize {
        self.buffer(channel).len()
    }

    /// Number of retained samples (the longest channel).
    pub fn len(&self) -> usize {
        self.channels.iter().map(RingBuffer::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.channels.first().map_or(0, RingBuffer::capacity)
    }
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_CAPACITY)
    }
}

impl Serialize for MetricHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Channel::COUNT))?;
        for channel in Channel::iter() {
            map.serialize_entry(channel.as_ref(), &self.snapshot(channel))?;
        }
        map.end()
    }
}
