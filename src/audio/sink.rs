//! Utilities for creating `rodio` sinks from a bound `MediaHandle`.
//!
//! The helper here decodes the in-memory payload, routes it through the
//! equalizer stage and prepares a paused `Sink` at the requested start
//! position.

use std::time::Duration;

use rodio::{Decoder, OutputStream, Sink, Source};

use crate::error::AudioError;
use crate::library::MediaHandle;

use super::dsp::EqualizerSource;
use super::graph::GraphSlot;

/// Create a paused `Sink` for `media` that starts playback at `start_at`.
///
/// Also returns the container's total duration, if it reports one.
pub(super) fn create_sink_at(
    stream: &OutputStream,
    media: &MediaHandle,
    graph: &GraphSlot,
    start_at: Duration,
) -> Result<(Sink, Option<Duration>), AudioError> {
    let decoder = Decoder::new(media.reader()).map_err(|e| AudioError::Decode(e.to_string()))?;
    let total = decoder.total_duration();

    // `skip_duration` is the fallback seeking primitive; Duration::ZERO is fine.
    let source = EqualizerSource::new(decoder.skip_duration(start_at), graph.clone());

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.pause();
    Ok((sink, total))
}
