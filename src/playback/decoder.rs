//! Decoder abstraction: one instance bound to one asset

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::library::AssetStream;

/// Errors from opening, preparing or driving a decoder
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("could not open {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt audio in {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("seek failed: {0}")]
    Seek(String),

    #[error("decoder is not prepared")]
    NotPrepared,

    #[error("decoder was released")]
    Released,
}

/// Identity of a decoder instance.
///
/// Unique for the lifetime of the process, so a completion issued for one
/// instance can never be mistaken for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderId(u64);

impl DecoderId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DecoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decoder#{}", self.0)
    }
}

/// Audio decoder/renderer bound to a single asset.
///
/// Operations on one instance are issued strictly in sequence by its owner.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode headers and get ready to play; resolves with the track
    /// duration when the asset declares one
    async fn prepare(&self) -> Result<Option<Duration>, DecoderError>;

    fn play(&self) -> Result<(), DecoderError>;

    fn pause(&self) -> Result<(), DecoderError>;

    /// Reposition; also works after the stream ran out
    fn seek(&self, position: Duration) -> Result<(), DecoderError>;

    /// Current playback position
    fn position(&self) -> Duration;

    /// The stream ran out of audio
    fn is_finished(&self) -> bool;

    fn stop(&self);

    /// Free the underlying resources; the instance is unusable afterwards
    fn release(&self);
}

/// Creates decoder instances for opened assets
pub trait DecoderFactory: Send + Sync {
    fn open(&self, stream: AssetStream) -> Result<Arc<dyn Decoder>, DecoderError>;
}
