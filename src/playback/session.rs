//! Playback session state machine
//!
//! A session lives for one visit of one track. It binds a single decoder,
//! drives it through load -> prepare -> play/pause/seek, and ends in
//! `Released`. Asynchronous steps (prepare, the post-seek settle delay) are
//! handed out as tickets and fed back in by the owner; every ticket carries
//! the identity it was issued for so late completions are ignored.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::decoder::{Decoder, DecoderError, DecoderId};
use super::progress::{position_for_fraction, Progress};

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No decoder bound
    Idle,
    /// Decoder bound, prepare in flight
    Loading,
    /// Prepared, about to auto-play
    Ready,
    Playing,
    Paused,
    /// Repositioned after a seek, waiting for the settle delay
    Seeking,
    /// Decoder stopped and released; terminal
    Released,
}

impl PlaybackState {
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Loading => "Loading",
            PlaybackState::Ready => "Ready",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Seeking => "Seeking",
            PlaybackState::Released => "Released",
        }
    }
}

struct BoundDecoder {
    id: DecoderId,
    decoder: Arc<dyn Decoder>,
}

#[derive(Debug, Clone, Copy)]
struct SeekGesture {
    fraction: f64,
    was_playing: bool,
}

#[derive(Debug, Clone, Copy)]
struct PendingSettle {
    seq: u64,
    resume: bool,
}

/// A prepare that has been started on a freshly bound decoder
pub struct PendingPrepare {
    id: DecoderId,
    decoder: Arc<dyn Decoder>,
}

impl PendingPrepare {
    pub fn decoder_id(&self) -> DecoderId {
        self.id
    }

    /// Run the prepare to completion
    pub async fn run(self) -> PrepareCompletion {
        let result = self.decoder.prepare().await;
        PrepareCompletion {
            decoder: self.id,
            result,
        }
    }
}

/// Outcome of a prepare, tagged with the decoder it belongs to
#[derive(Debug)]
pub struct PrepareCompletion {
    pub decoder: DecoderId,
    pub result: Result<Option<Duration>, DecoderError>,
}

/// Handle for the settle delay that follows a seek release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTicket {
    pub decoder: DecoderId,
    seq: u64,
}

/// Playback of one catalog entry
pub struct PlaybackSession {
    track_index: usize,
    state: PlaybackState,
    position_ms: u64,
    duration_ms: u64,
    /// Used when the decoder cannot tell the duration itself
    duration_hint: Option<Duration>,
    decoder: Option<BoundDecoder>,
    gesture: Option<SeekGesture>,
    settle: Option<PendingSettle>,
    settle_seq: u64,
    error: Option<String>,
}

impl PlaybackSession {
    pub fn new(track_index: usize) -> Self {
        Self {
            track_index,
            state: PlaybackState::Idle,
            position_ms: 0,
            duration_ms: 0,
            duration_hint: None,
            decoder: None,
            gesture: None,
            settle: None,
            settle_seq: 0,
            error: None,
        }
    }

    /// Duration to fall back to when the asset does not declare one
    pub fn with_duration_hint(mut self, hint: Option<Duration>) -> Self {
        self.duration_hint = hint;
        self
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Transport and seek controls only act on a prepared decoder
    pub fn controls_enabled(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Ready
                | PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::Seeking
        )
    }

    /// Last recoverable failure, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_seeking(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn active_decoder(&self) -> Option<DecoderId> {
        self.decoder.as_ref().map(|b| b.id)
    }

    /// Bind a newly opened decoder and start preparing it.
    ///
    /// An open failure leaves the session `Idle` with the error recorded.
    pub fn begin_load(
        &mut self,
        opened: Result<Arc<dyn Decoder>, DecoderError>,
    ) -> Option<PendingPrepare> {
        if self.state != PlaybackState::Idle {
            warn!(
                "Ignoring load for track {} in state {}",
                self.track_index,
                self.state.label()
            );
            return None;
        }

        let decoder = match opened {
            Ok(decoder) => decoder,
            Err(e) => {
                self.fail(e);
                return None;
            }
        };

        let id = DecoderId::next();
        debug!("Track {}: bound {}, preparing", self.track_index, id);
        self.decoder = Some(BoundDecoder {
            id,
            decoder: decoder.clone(),
        });
        self.error = None;
        self.position_ms = 0;
        self.state = PlaybackState::Loading;

        Some(PendingPrepare { id, decoder })
    }

    /// Apply a prepare result; returns false when it belongs to a superseded decoder
    pub fn complete_prepare(&mut self, completion: PrepareCompletion) -> bool {
        if self.state != PlaybackState::Loading || self.active_decoder() != Some(completion.decoder) {
            debug!("Ignoring stale prepare completion from {}", completion.decoder);
            return false;
        }

        match completion.result {
            Ok(declared) => {
                let duration = declared.filter(|d| !d.is_zero()).or(self.duration_hint);
                if duration.is_none() {
                    warn!("Unknown duration for track {}, seeking disabled", self.track_index);
                }
                self.duration_ms = duration.map_or(0, |d| d.as_millis() as u64);
                self.state = PlaybackState::Ready;
                info!(
                    "Track {} ready ({} ms), starting playback",
                    self.track_index, self.duration_ms
                );
                self.play();
            }
            Err(e) => self.fail(e),
        }
        true
    }

    /// Play/pause button
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused | PlaybackState::Ready => self.play(),
            PlaybackState::Seeking => {
                if let Some(settle) = self.settle.as_mut() {
                    settle.resume = !settle.resume;
                    debug!("Resume after seek set to {}", settle.resume);
                }
            }
            state => debug!("Toggle ignored in state {}", state.label()),
        }
    }

    /// Sample the decoder position; only acts while playing
    pub fn poll_progress(&mut self) -> Option<Progress> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let decoder = &self.decoder.as_ref()?.decoder;
        let finished = decoder.is_finished();
        let position = decoder.position().as_millis() as u64;

        // The stream can end before the declared duration
        self.position_ms = if self.duration_ms == 0 {
            position
        } else if finished {
            self.duration_ms
        } else {
            position.min(self.duration_ms)
        };

        if finished || (self.duration_ms > 0 && self.position_ms >= self.duration_ms) {
            debug!("Track {} reached the end", self.track_index);
            self.pause();
        }
        Some(self.progress())
    }

    /// What the seek bar shows: the drag value during a gesture, else the
    /// last sampled position
    pub fn progress(&self) -> Progress {
        match self.gesture {
            Some(gesture) => Progress::from_fraction(gesture.fraction, self.duration_ms),
            None => Progress::new(self.position_ms, self.duration_ms),
        }
    }

    /// Track the seek control while the user drags it
    pub fn seek_drag(&mut self, fraction: f64) -> bool {
        if !self.controls_enabled() {
            return false;
        }
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };

        match self.gesture.as_mut() {
            Some(gesture) => gesture.fraction = fraction,
            None => {
                let was_playing = match self.state {
                    PlaybackState::Playing => true,
                    PlaybackState::Seeking => self.settle.is_some_and(|s| s.resume),
                    _ => false,
                };
                self.gesture = Some(SeekGesture {
                    fraction,
                    was_playing,
                });
            }
        }
        true
    }

    /// Commit the drag: pause, reposition, then wait for the settle delay
    pub fn seek_release(&mut self) -> Option<SettleTicket> {
        let gesture = self.gesture.take()?;
        let bound = self.decoder.as_ref()?;
        let id = bound.id;
        let decoder = bound.decoder.clone();

        let target = position_for_fraction(gesture.fraction, self.duration_ms);

        if let Err(e) = decoder.pause() {
            self.fail(e);
            return None;
        }
        match decoder.seek(Duration::from_millis(target)) {
            Ok(()) => self.position_ms = target,
            Err(e) => {
                warn!("Seek to {} ms failed: {}", target, e);
                self.position_ms = (decoder.position().as_millis() as u64).min(self.duration_ms);
            }
        }

        self.settle_seq += 1;
        self.settle = Some(PendingSettle {
            seq: self.settle_seq,
            resume: gesture.was_playing,
        });
        self.state = PlaybackState::Seeking;
        debug!(
            "Seeked to {} ms, resume={} after settle",
            target, gesture.was_playing
        );

        Some(SettleTicket {
            decoder: id,
            seq: self.settle_seq,
        })
    }

    /// Finish a seek once the settle delay elapsed
    pub fn complete_settle(&mut self, ticket: SettleTicket) -> bool {
        let current = self.settle.is_some_and(|s| s.seq == ticket.seq);
        if self.state != PlaybackState::Seeking
            || self.active_decoder() != Some(ticket.decoder)
            || !current
        {
            debug!("Ignoring stale settle for {}", ticket.decoder);
            return false;
        }

        let resume = self.settle.take().is_some_and(|s| s.resume);
        if resume {
            self.play();
        } else {
            self.state = PlaybackState::Paused;
        }
        true
    }

    /// Stop and release the decoder; the session is finished afterwards
    pub fn release(&mut self) {
        if let Some(bound) = self.decoder.take() {
            bound.decoder.stop();
            bound.decoder.release();
            debug!("Track {}: released {}", self.track_index, bound.id);
        }
        self.gesture = None;
        self.settle = None;
        self.state = PlaybackState::Released;
    }

    fn play(&mut self) {
        let Some(bound) = self.decoder.as_ref() else {
            return;
        };
        let decoder = bound.decoder.clone();

        // Replay from the top once the end was reached
        let at_end = self.duration_ms > 0 && self.position_ms >= self.duration_ms;
        if at_end || decoder.is_finished() {
            if let Err(e) = decoder.seek(Duration::ZERO) {
                warn!("Rewind failed: {}", e);
            } else {
                self.position_ms = 0;
            }
        }

        match decoder.play() {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => self.fail(e),
        }
    }

    fn pause(&mut self) {
        let Some(bound) = self.decoder.as_ref() else {
            return;
        };
        match bound.decoder.pause() {
            Ok(()) => self.state = PlaybackState::Paused,
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: DecoderError) {
        warn!("Playback of track {} failed: {}", self.track_index, error);
        if let Some(bound) = self.decoder.take() {
            bound.decoder.stop();
            bound.decoder.release();
        }
        self.gesture = None;
        self.settle = None;
        self.position_ms = 0;
        self.duration_ms = 0;
        self.error = Some(error.to_string());
        self.state = PlaybackState::Idle;
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.state != PlaybackState::Released {
            self.release();
        }
    }
}
