//! Stand-in collaborators for running the bridge without a real rendering
//! or sequencing engine.

use anyhow::{Context, bail};
use lumen_bridge::{
    ChannelBuffer, DeviceId, RenderError, Renderer, Rgba, Sequencer, SequencerError,
    StrandLayout, Topology, UniverseId, fingerprint,
};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

/// Time the chase head spends on each element
const CHASE_STEP: Duration = Duration::from_millis(50);

/// Lit elements behind the head, fading out
const CHASE_TAIL: usize = 6;

/// Renderer that only logs what it would have drawn.
#[derive(Debug, Default)]
pub struct LogRenderer {
    renders: u64,
}

impl<S: serde::Serialize> Renderer<S> for LogRenderer {
    fn render(&mut self, intensity: f32, status: &S) -> Result<(), RenderError> {
        let digest = fingerprint(status)?;
        self.renders += 1;
        info!(
            "Render #{} at intensity {:.2}: status {:?}",
            self.renders, intensity, digest
        );
        Ok(())
    }
}

/// Strand lengths of the single demo device, e.g. `64,64,0,32`.
///
/// A zero marks an unused output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrandLengths(pub Vec<usize>);

impl FromStr for StrandLengths {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lengths = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid strand length '{}'", part.trim()))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if lengths.iter().all(|&len| len == 0) {
            bail!("at least one strand must be longer than zero");
        }
        Ok(Self(lengths))
    }
}

/// Single-universe colour chase laid out end to end across the strands.
#[derive(Debug)]
pub struct ChaseSequencer {
    strands: Vec<usize>,
    started: Option<Instant>,
    frame: ChannelBuffer,
}

impl ChaseSequencer {
    pub fn new(strands: StrandLengths) -> Self {
        let total = strands.0.iter().sum();
        Self {
            strands: strands.0,
            started: None,
            frame: vec![Rgba::OFF; total],
        }
    }

    fn total(&self) -> usize {
        self.frame.len()
    }
}

impl Sequencer for ChaseSequencer {
    fn advance(&mut self, now: Instant) {
        let total = self.total();
        if total == 0 {
            return;
        }

        let started = *self.started.get_or_insert(now);
        let step = (now.saturating_duration_since(started).as_millis()
            / CHASE_STEP.as_millis()) as usize;
        let head = step % total;
        // One hue per lap
        let base = wheel(((step / total) * 37 % 256) as u8);

        self.frame.fill(Rgba::OFF);
        for i in 0..CHASE_TAIL.min(total) {
            let index = (head + total - i) % total;
            let fade = |c: u8| (c as usize * (CHASE_TAIL - i) / CHASE_TAIL) as u8;
            self.frame[index] = Rgba::opaque(fade(base.r), fade(base.g), fade(base.b));
        }
    }

    fn universes(&self) -> Vec<UniverseId> {
        vec![UniverseId(0)]
    }

    fn universe_data(&self, universe: UniverseId) -> ChannelBuffer {
        if universe == UniverseId(0) {
            self.frame.clone()
        } else {
            ChannelBuffer::new()
        }
    }

    fn topology(&self) -> Result<Topology, SequencerError> {
        let mut offset = 0;
        let strands = self
            .strands
            .iter()
            .map(|&len| {
                let layout = StrandLayout::new(len, UniverseId(0), offset);
                offset += len;
                layout
            })
            .collect();
        Ok(Topology::new().with_device(DeviceId(0), strands))
    }
}

/// Fully saturated colour at position `pos` around the hue circle.
fn wheel(pos: u8) -> Rgba {
    match pos {
        0..=84 => Rgba::opaque(255 - pos * 3, pos * 3, 0),
        85..=169 => {
            let p = pos - 85;
            Rgba::opaque(0, 255 - p * 3, p * 3)
        },
        _ => {
            let p = pos - 170;
            Rgba::opaque(p * 3, 0, 255 - p * 3)
        },
    }
}
