//! The processing graph: equalizer band parameters, analysis tap, and the
//! suspended/running switch shared by every decoded source.
//!
//! The graph only holds parameters and shared buffers. The per-sample work
//! happens in [`super::dsp::EqualizerSource`], which reads the graph once per
//! block.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use biquad::{Coefficients, Hertz, Type};
use tracing::{debug, info};

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Number of equalizer bands.
pub const BAND_COUNT: usize = 8;

/// Centre frequency of each band, in Hz.
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0,
];

/// Gains are clamped to `±MAX_GAIN_DB`.
pub const MAX_GAIN_DB: f32 = 12.0;

/// Shortest gain ramp time constant (milliseconds).
pub const MIN_RAMP_MS: u64 = 10;

/// Mono samples kept for visualization.
const TAP_CAPACITY: usize = 2048;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GraphState {
    Running,
    Suspended,
}

/// Peaking-filter coefficients for one band.
pub(super) fn peaking(
    sample_rate: f32,
    freq: f32,
    q: f32,
    gain_db: f32,
) -> Result<Coefficients<f32>, biquad::Errors> {
    let fs = Hertz::<f32>::from_hz(sample_rate)?;
    let f0 = Hertz::<f32>::from_hz(freq)?;
    Coefficients::<f32>::from_params(Type::PeakingEQ(gain_db), fs, f0, q)
}

pub(super) fn clamp_gain(db: f32) -> f32 {
    if db.is_finite() {
        db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
    } else {
        0.0
    }
}

/// Exponential approach from the value at the last change toward `target`.
#[derive(Debug, Copy, Clone)]
struct GainRamp {
    from: f32,
    target: f32,
    changed_at: Instant,
}

impl GainRamp {
    fn settled(db: f32, at: Instant) -> Self {
        Self {
            from: db,
            target: db,
            changed_at: at,
        }
    }

    fn value_at(&self, at: Instant, tau: Duration) -> f32 {
        let t = at.saturating_duration_since(self.changed_at).as_secs_f32();
        let k = (-t / tau.as_secs_f32()).exp();
        self.target + (self.from - self.target) * k
    }

    fn retarget(&mut self, target: f32, at: Instant, tau: Duration) {
        self.from = self.value_at(at, tau);
        self.target = target;
        self.changed_at = at;
    }
}

/// Read-only view over the most recent mono samples of the output.
#[derive(Clone, Default)]
pub struct AnalysisTap {
    samples: Arc<Mutex<VecDeque<f32>>>,
}

impl AnalysisTap {
    /// Append samples, dropping the oldest ones past capacity.
    ///
    /// Called from the output path: never blocks, drops the batch instead.
    pub(super) fn push(&self, batch: &[f32]) {
        if let Ok(mut buf) = self.samples.try_lock() {
            for &s in batch {
                if buf.len() >= TAP_CAPACITY {
                    buf.pop_front();
                }
                buf.push_back(s);
            }
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rms(&self) -> f32 {
        let Ok(buf) = self.samples.lock() else {
            return 0.0;
        };
        if buf.is_empty() {
            return 0.0;
        }
        let sum: f32 = buf.iter().map(|s| s * s).sum();
        (sum / buf.len() as f32).sqrt()
    }

    pub fn peak(&self) -> f32 {
        self.samples
            .lock()
            .map(|buf| buf.iter().fold(0.0_f32, |m, s| m.max(s.abs())))
            .unwrap_or(0.0)
    }

    #[cfg(test)]
    pub fn clear(&self) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.clear();
        }
    }
}

struct GraphInner {
    q: f32,
    tau: Duration,
    ramps: Mutex<[GainRamp; BAND_COUNT]>,
    suspended: AtomicBool,
    tap: AnalysisTap,
}

/// Shared handle to the equalizer parameters and analysis tap.
#[derive(Clone)]
pub struct AudioGraph {
    inner: Arc<GraphInner>,
}

impl AudioGraph {
    /// Build the graph, validating every band against `cfg.graph_sample_rate`.
    pub fn new(cfg: &AudioConfig, gains: [f32; BAND_COUNT]) -> Result<Self, AudioError> {
        let fs = cfg.graph_sample_rate as f32;
        for (&freq, &db) in BAND_FREQUENCIES.iter().zip(gains.iter()) {
            peaking(fs, freq, cfg.eq_q, clamp_gain(db)).map_err(|e| {
                AudioError::AudioUnavailable(format!(
                    "band {freq} Hz at {} Hz sample rate: {e:?}",
                    cfg.graph_sample_rate
                ))
            })?;
        }

        let now = Instant::now();
        let ramps = gains.map(|db| GainRamp::settled(clamp_gain(db), now));
        info!(
            sample_rate = cfg.graph_sample_rate,
            q = cfg.eq_q,
            "audio graph built"
        );

        Ok(Self {
            inner: Arc::new(GraphInner {
                q: cfg.eq_q,
                tau: Duration::from_millis(cfg.eq_ramp_ms.max(MIN_RAMP_MS)),
                ramps: Mutex::new(ramps),
                suspended: AtomicBool::new(false),
                tap: AnalysisTap::default(),
            }),
        })
    }

    pub fn q(&self) -> f32 {
        self.inner.q
    }

    /// Ramp `band` toward `db`. Out-of-range bands are ignored.
    pub fn set_gain(&self, band: usize, db: f32) {
        self.set_gain_at(band, db, Instant::now());
    }

    pub fn set_gain_at(&self, band: usize, db: f32, now: Instant) {
        let target = clamp_gain(db);
        let Ok(mut ramps) = self.inner.ramps.lock() else {
            return;
        };
        if let Some(ramp) = ramps.get_mut(band) {
            ramp.retarget(target, now, self.inner.tau);
            debug!(band, target, "eq gain ramp started");
        }
    }

    /// Effective gain of `band` at `at`.
    #[cfg(test)]
    pub fn gain_at(&self, band: usize, at: Instant) -> f32 {
        self.inner
            .ramps
            .lock()
            .ok()
            .and_then(|r| r.get(band).map(|ramp| ramp.value_at(at, self.inner.tau)))
            .unwrap_or(0.0)
    }

    pub fn gains_at(&self, at: Instant) -> [f32; BAND_COUNT] {
        let ramps: [GainRamp; BAND_COUNT] = match self.inner.ramps.lock() {
            Ok(r) => *r,
            Err(_) => return [0.0; BAND_COUNT],
        };
        ramps.map(|ramp| ramp.value_at(at, self.inner.tau))
    }

    #[cfg(test)]
    pub fn target_gain(&self, band: usize) -> f32 {
        self.inner
            .ramps
            .lock()
            .ok()
            .and_then(|r| r.get(band).map(|ramp| ramp.target))
            .unwrap_or(0.0)
    }

    pub fn analysis_tap(&self) -> AnalysisTap {
        self.inner.tap.clone()
    }

    pub fn state(&self) -> GraphState {
        if self.inner.suspended.load(Ordering::Acquire) {
            GraphState::Suspended
        } else {
            GraphState::Running
        }
    }

    /// Stop DSP work. Sources connected to the graph output silence.
    pub fn suspend(&self) -> GraphState {
        if !self.inner.suspended.swap(true, Ordering::AcqRel) {
            debug!("audio graph suspended");
        }
        GraphState::Suspended
    }

    pub fn resume(&self) -> GraphState {
        if self.inner.suspended.swap(false, Ordering::AcqRel) {
            debug!("audio graph resumed");
        }
        GraphState::Running
    }
}

/// Lazily built, process-wide graph. Cloning shares the slot.
#[derive(Clone, Default)]
pub struct GraphSlot(Arc<OnceLock<AudioGraph>>);

impl GraphSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&AudioGraph> {
        self.0.get()
    }

    /// The existing graph, or a new one built from `cfg` and `gains`.
    pub fn get_or_build(
        &self,
        cfg: &AudioConfig,
        gains: [f32; BAND_COUNT],
    ) -> Result<&AudioGraph, AudioError> {
        if let Some(graph) = self.0.get() {
            return Ok(graph);
        }
        let graph = AudioGraph::new(cfg, gains)?;
        Ok(self.0.get_or_init(|| graph))
    }
}
