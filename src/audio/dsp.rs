//! Sample-level equalizer stage.
//!
//! Wraps a decoded source, runs it through one peaking biquad per band and
//! channel, and feeds a mono mix of the result to the graph's analysis tap.
//! Coefficients are refreshed from the ramped gains once per block.

use std::time::{Duration, Instant};

use biquad::{Biquad, Coefficients, DirectForm2Transposed};
use rodio::Source;
use rodio::source::SeekError;

use super::graph::{AnalysisTap, BAND_COUNT, BAND_FREQUENCIES, GraphSlot, GraphState, peaking};

/// Frames processed between coefficient refreshes.
const BLOCK_FRAMES: usize = 256;

/// Gain difference (dB) below which coefficients are not recomputed.
const GAIN_EPSILON: f32 = 0.01;

const IDENTITY: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

type Bank = [DirectForm2Transposed<f32>; BAND_COUNT];

fn identity_bank() -> Bank {
    std::array::from_fn(|_| DirectForm2Transposed::<f32>::new(IDENTITY))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    /// No graph (not built yet, or unavailable): samples pass unchanged.
    Bypass,
    Running,
    Suspended,
}

pub struct EqualizerSource<S> {
    inner: S,
    slot: GraphSlot,

    channels: u16,
    sample_rate: u32,
    banks: Vec<Bank>,
    applied: Option<[f32; BAND_COUNT]>,

    mode: Mode,
    tap: Option<AnalysisTap>,
    frames_left: usize,
    channel: usize,
    mono_acc: f32,
    tap_buf: Vec<f32>,
}

impl<S> EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    pub fn new(inner: S, slot: GraphSlot) -> Self {
        let channels = inner.channels().max(1);
        let sample_rate = inner.sample_rate();
        Self {
            inner,
            slot,
            channels,
            sample_rate,
            banks: (0..channels).map(|_| identity_bank()).collect(),
            applied: None,
            mode: Mode::Bypass,
            tap: None,
            frames_left: 0,
            channel: 0,
            mono_acc: 0.0,
            tap_buf: Vec::with_capacity(BLOCK_FRAMES),
        }
    }

    fn flush_tap(&mut self) {
        if self.tap_buf.is_empty() {
            return;
        }
        if let Some(tap) = &self.tap {
            tap.push(&self.tap_buf);
        }
        self.tap_buf.clear();
    }

    /// Re-read the graph: state, gains and format changes.
    fn begin_block(&mut self) {
        self.flush_tap();
        self.frames_left = BLOCK_FRAMES;

        let channels = self.inner.channels().max(1);
        let sample_rate = self.inner.sample_rate();
        if channels != self.channels || sample_rate != self.sample_rate {
            self.channels = channels;
            self.sample_rate = sample_rate;
            self.banks = (0..channels).map(|_| identity_bank()).collect();
            self.applied = None;
            self.channel = 0;
            self.mono_acc = 0.0;
        }

        let Some(graph) = self.slot.get() else {
            self.mode = Mode::Bypass;
            return;
        };
        if self.tap.is_none() {
            self.tap = Some(graph.analysis_tap());
        }
        self.mode = match graph.state() {
            GraphState::Running => Mode::Running,
            GraphState::Suspended => Mode::Suspended,
        };

        let gains = graph.gains_at(Instant::now());
        let stale = match &self.applied {
            None => true,
            Some(prev) => prev
                .iter()
                .zip(gains.iter())
                .any(|(a, b)| (a - b).abs() > GAIN_EPSILON),
        };
        if !stale {
            return;
        }

        let q = graph.q();
        for (band, (&freq, &db)) in BAND_FREQUENCIES.iter().zip(gains.iter()).enumerate() {
            // Bands above Nyquist for this source stay flat.
            let coeffs = peaking(self.sample_rate as f32, freq, q, db).unwrap_or(IDENTITY);
            for bank in &mut self.banks {
                bank[band].update_coefficients(coeffs);
            }
        }
        self.applied = Some(gains);
    }

    fn process(&mut self, sample: f32) -> f32 {
        match self.mode {
            Mode::Bypass => sample,
            Mode::Suspended => 0.0,
            Mode::Running => {
                let bank = &mut self.banks[self.channel];
                bank.iter_mut().fold(sample, |x, f| f.run(x))
            }
        }
    }
}

impl<S> Iterator for EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.frames_left == 0 && self.channel == 0 {
            self.begin_block();
        }

        let Some(sample) = self.inner.next() else {
            self.flush_tap();
            return None;
        };
        let out = self.process(sample);

        self.mono_acc += out;
        self.channel += 1;
        if self.channel >= self.channels as usize {
            if self.mode == Mode::Running {
                self.tap_buf.push(self.mono_acc / self.channels as f32);
            }
            self.mono_acc = 0.0;
            self.channel = 0;
            self.frames_left = self.frames_left.saturating_sub(1);
        }

        Some(out)
    }
}

impl<S> Source for EqualizerSource<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.inner.try_seek(pos)?;
        for bank in &mut self.banks {
            for f in bank.iter_mut() {
                f.reset_state();
            }
        }
        self.channel = 0;
        self.mono_acc = 0.0;
        self.frames_left = 0;
        Ok(())
    }
}
