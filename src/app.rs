//! Application module: the terminal view model used by the UI and runtime.
//!
//! Library, playback and session state live in their own modules; `App` only
//! holds what the terminal view needs on top of them (cursor, input prompts,
//! the selected equalizer band).

mod model;

pub use model::*;
