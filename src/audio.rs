mod dsp;
mod graph;
mod player;
mod sink;
mod thread;
mod types;

pub use graph::{
    AnalysisTap, AudioGraph, BAND_COUNT, BAND_FREQUENCIES, GraphSlot, GraphState, MAX_GAIN_DB,
    MIN_RAMP_MS,
};
pub use player::AudioPlayer;
pub use types::{AudioCmd, AudioEvent, PlayFailure, PlaybackHandle, PlaybackInfo, RequestId};
