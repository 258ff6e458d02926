mod controller;
mod state;

pub use controller::PlaybackController;
pub use state::{ControllerEvent, PlaybackState, RepeatMode};

#[cfg(test)]
mod tests;
