//! Audio playback: decoder seam, session state machine and helpers

pub mod decoder;
pub mod navigation;
pub mod progress;
pub mod rodio_backend;
pub mod session;
#[cfg(test)]
pub mod testing;

pub use decoder::{Decoder, DecoderError, DecoderFactory, DecoderId};
pub use navigation::{next_index, prev_index};
pub use progress::Progress;
pub use rodio_backend::RodioBackend;
pub use session::{PendingPrepare, PlaybackSession, PlaybackState, PrepareCompletion, SettleTicket};
