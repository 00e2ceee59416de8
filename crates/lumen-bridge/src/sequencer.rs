//! Sequencing engine interface and physical layout
//!
//! The sequencing engine computes colours for logical universes. The
//! [`Topology`] says how those universes land on physical strands: each strand
//! takes `len` elements from one universe, starting at `offset`.

use crate::SequencerError;
use lumen_protocol::{BROADCAST_CHANNEL, ChannelBuffer, MAX_PIXELS, Rgba};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

/// Logical channel ("universe") id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniverseId(pub u32);

/// Physical output device id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for UniverseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "universe {}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.0)
    }
}

/// One physical strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrandLayout {
    /// Addressable elements on the strand; 0 means unused
    pub len: usize,
    /// Universe feeding this strand
    pub universe: UniverseId,
    /// First universe element shown on the strand
    pub offset: usize,
    /// OPC channel the strand's messages are addressed to
    pub channel: u8,
}

impl StrandLayout {
    /// Strand addressed on the broadcast channel.
    pub fn new(len: usize, universe: UniverseId, offset: usize) -> Self {
        Self {
            len,
            universe,
            offset,
            channel: BROADCAST_CHANNEL,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// Placeholder for an unused output.
    pub fn unused() -> Self {
        Self::new(0, UniverseId(0), 0)
    }
}

/// Device → ordered strands.
///
/// Strands are sent in order; the n-th strand (1-based) of a device is
/// reported as strand n.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    devices: BTreeMap<DeviceId, Vec<StrandLayout>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper.
    pub fn with_device(mut self, device: DeviceId, strands: Vec<StrandLayout>) -> Self {
        self.add_device(device, strands);
        self
    }

    pub fn add_device(&mut self, device: DeviceId, strands: Vec<StrandLayout>) {
        self.devices.insert(device, strands);
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &[StrandLayout])> {
        self.devices.iter().map(|(id, strands)| (*id, strands.as_slice()))
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Strands with at least one element.
    pub fn active_strands(&self) -> usize {
        self.devices
            .values()
            .flat_map(|strands| strands.iter())
            .filter(|s| s.len > 0)
            .count()
    }

    /// Check the layout fits the wire format.
    pub fn validate(&self) -> Result<(), SequencerError> {
        if self.active_strands() == 0 {
            return Err(SequencerError::Topology("no active strands".into()));
        }
        for (device, strands) in &self.devices {
            if let Some(strand) = strands.iter().find(|s| s.len > MAX_PIXELS) {
                return Err(SequencerError::Topology(format!(
                    "{device} strand of {} elements exceeds {MAX_PIXELS}",
                    strand.len
                )));
            }
        }
        Ok(())
    }
}

/// External sequencing engine.
///
/// Turns elapsed time into per-universe colours. Called only from the frame
/// streamer thread.
pub trait Sequencer: Send {
    /// Advance internal state to `now`.
    fn advance(&mut self, now: Instant);

    /// Every universe the engine produces data for.
    fn universes(&self) -> Vec<UniverseId>;

    /// Colours for `universe` as of the last `advance`.
    fn universe_data(&self, universe: UniverseId) -> ChannelBuffer;

    /// Physical layout of the attached devices.
    fn topology(&self) -> Result<Topology, SequencerError>;
}

/// Universe buffers staged for the current frame.
#[derive(Debug, Default)]
pub struct FrameStore {
    universes: HashMap<UniverseId, ChannelBuffer>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_universe(&mut self, universe: UniverseId, data: ChannelBuffer) {
        self.universes.insert(universe, data);
    }

    /// Colours for one strand.
    ///
    /// Always exactly `layout.len` long; elements the universe does not cover
    /// (short buffer, unknown universe) are off.
    pub fn strand_data(&self, layout: &StrandLayout) -> ChannelBuffer {
        let source = self
            .universes
            .get(&layout.universe)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let start = layout.offset.min(source.len());
        let end = layout.offset.saturating_add(layout.len).min(source.len());

        let mut data = Vec::with_capacity(layout.len);
        data.extend_from_slice(&source[start..end]);
        data.resize(layout.len, Rgba::OFF);
        data
    }
}
