//! Scripted decoder used by the state machine tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::decoder::{Decoder, DecoderError, DecoderFactory};
use crate::library::AssetStream;

#[derive(Default)]
struct FakeState {
    playing: bool,
    released: bool,
    position: Duration,
    finished: bool,
    seeks: usize,
    calls: Vec<String>,
}

pub struct FakeDecoder {
    pub asset: String,
    /// `None` models an asset without a declared duration
    duration: Option<Duration>,
    prepare_error: Option<String>,
    state: Mutex<FakeState>,
}

impl FakeDecoder {
    pub fn new(duration: Duration) -> Arc<Self> {
        Self::for_asset("fake.mp3", Some(duration), None)
    }

    pub fn undeclared() -> Arc<Self> {
        Self::for_asset("fake.mp3", None, None)
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::for_asset("fake.mp3", None, Some(reason.to_string()))
    }

    fn for_asset(asset: &str, duration: Option<Duration>, prepare_error: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            asset: asset.to_string(),
            duration,
            prepare_error,
            state: Mutex::new(FakeState::default()),
        })
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().unwrap().released
    }

    pub fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    /// Simulate the stream running out at the current position
    pub fn set_finished(&self) {
        let mut state = self.state.lock().unwrap();
        state.finished = true;
        state.playing = false;
    }

    pub fn seek_count(&self) -> usize {
        self.state.lock().unwrap().seeks
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        state
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn prepare(&self) -> Result<Option<Duration>, DecoderError> {
        let state = self.record("prepare");
        if state.released {
            return Err(DecoderError::Released);
        }
        if let Some(reason) = &self.prepare_error {
            return Err(DecoderError::Corrupt {
                name: self.asset.clone(),
                reason: reason.clone(),
            });
        }
        Ok(self.duration)
    }

    fn play(&self) -> Result<(), DecoderError> {
        let mut state = self.record("play");
        if state.released {
            return Err(DecoderError::Released);
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) -> Result<(), DecoderError> {
        let mut state = self.record("pause");
        if state.released {
            return Err(DecoderError::Released);
        }
        state.playing = false;
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<(), DecoderError> {
        let mut state = self.record("seek");
        state.seeks += 1;
        state.position = position;
        state.finished = false;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn is_finished(&self) -> bool {
        self.state.lock().unwrap().finished
    }

    fn stop(&self) {
        let mut state = self.record("stop");
        state.playing = false;
    }

    fn release(&self) {
        let mut state = self.record("release");
        state.playing = false;
        state.released = true;
    }
}

/// Factory handing out fake decoders, remembering every instance
#[derive(Default)]
pub struct FakeFactory {
    pub duration: Option<Duration>,
    pub corrupt: HashSet<String>,
    created: Mutex<Vec<Arc<FakeDecoder>>>,
}

impl FakeFactory {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Default::default()
        }
    }

    /// Hand out decoders that cannot tell their duration
    pub fn undeclared() -> Self {
        Self::default()
    }

    pub fn with_corrupt(mut self, asset: &str) -> Self {
        self.corrupt.insert(asset.to_string());
        self
    }

    pub fn created(&self) -> Vec<Arc<FakeDecoder>> {
        self.created.lock().unwrap().clone()
    }
}

impl DecoderFactory for FakeFactory {
    fn open(&self, stream: AssetStream) -> Result<Arc<dyn Decoder>, DecoderError> {
        let error = self
            .corrupt
            .contains(&stream.name)
            .then(|| "not an audio file".to_string());
        let decoder = FakeDecoder::for_asset(&stream.name, self.duration, error);
        self.created.lock().unwrap().push(decoder.clone());
        Ok(decoder as Arc<dyn Decoder>)
    }
}
