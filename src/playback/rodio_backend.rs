//! rodio-backed decoder
//!
//! The output stream is owned by a dedicated thread for the lifetime of the
//! backend; decoders only hold a handle to its mixer. Each decoder owns one
//! `Sink` fed by the decoded asset. rodio drops a source from the sink once it
//! runs out, so the decoder keeps a second handle on the asset file and
//! decodes it again before the next play or seek.

use async_trait::async_trait;
use lofty::prelude::*;
use lofty::probe::Probe;
use rodio::mixer::Mixer;
use rodio::{OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::{BufReader, Seek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::decoder::{Decoder, DecoderError, DecoderFactory};
use crate::library::AssetStream;

/// Shared audio output, handing out one decoder per asset
pub struct RodioBackend {
    mixer: Mixer,
    // Dropping the sender lets the output thread exit and close the stream
    _shutdown: Option<mpsc::Sender<()>>,
}

impl RodioBackend {
    /// Open the default output device
    pub fn open_default() -> Result<Self, DecoderError> {
        let (mixer_tx, mixer_rx) = mpsc::channel::<Result<Mixer, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    // rodio logs to stderr on drop, which would tear through the TUI
                    stream.log_on_drop(false);
                    let _ = mixer_tx.send(Ok(stream.mixer().clone()));
                    // Blocks until the backend is dropped
                    let _ = shutdown_rx.recv();
                    debug!("Closing audio output");
                }
                Err(e) => {
                    let _ = mixer_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| DecoderError::Output(e.to_string()))?;

        let mixer = mixer_rx
            .recv()
            .map_err(|_| DecoderError::Output("output thread exited".to_string()))?
            .map_err(DecoderError::Output)?;

        debug!("Opened default audio output");
        Ok(Self {
            _shutdown: Some(shutdown_tx),
            ..Self::with_mixer(mixer)
        })
    }

    /// Play into a mixer whose output is driven elsewhere
    pub fn with_mixer(mixer: Mixer) -> Self {
        Self {
            mixer,
            _shutdown: None,
        }
    }
}

impl DecoderFactory for RodioBackend {
    fn open(&self, stream: AssetStream) -> Result<Arc<dyn Decoder>, DecoderError> {
        Ok(Arc::new(RodioDecoder {
            name: stream.name.clone(),
            mixer: self.mixer.clone(),
            source: Mutex::new(Some(stream)),
            reopen: Mutex::new(None),
            sink: Mutex::new(None),
            released: AtomicBool::new(false),
        }))
    }
}

/// One asset bound to one sink
pub struct RodioDecoder {
    name: String,
    mixer: Mixer,
    source: Mutex<Option<AssetStream>>,
    /// Handle used to decode the asset again after it ran out
    reopen: Mutex<Option<File>>,
    sink: Mutex<Option<Arc<Sink>>>,
    released: AtomicBool,
}

type FileSource = rodio::Decoder<BufReader<File>>;

impl RodioDecoder {
    /// The prepared sink; the lock is not held while the caller uses it
    fn sink(&self) -> Result<Arc<Sink>, DecoderError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(DecoderError::Released);
        }
        let sink = self.sink.lock().map_err(|_| DecoderError::Released)?;
        sink.clone().ok_or(DecoderError::NotPrepared)
    }

    /// Append a fresh decode of the asset if the previous one ran out
    fn refill(&self, sink: &Sink) -> Result<(), DecoderError> {
        if !sink.empty() {
            return Ok(());
        }
        let file = {
            let reopen = self.reopen.lock().map_err(|_| DecoderError::Released)?;
            let file = reopen.as_ref().ok_or(DecoderError::NotPrepared)?;
            file.try_clone().map_err(|source| DecoderError::Open {
                name: self.name.clone(),
                source,
            })?
        };
        // Only headers are read here; samples are decoded on the output thread
        sink.append(decode(&self.name, file)?);
        debug!("Decoding {} again after it ran out", self.name);
        Ok(())
    }
}

/// Duration declared by the asset's tags, if any
fn tagged_duration(name: &str, file: &mut File) -> Option<Duration> {
    match Probe::new(file).guess_file_type() {
        Ok(file_type) => file_type
            .read()
            .ok()
            .map(|tagged| tagged.properties().duration())
            .filter(|d| !d.is_zero()),
        Err(e) => {
            debug!("Could not read tags of {}: {}", name, e);
            None
        }
    }
}

/// Decode from the start of the file
fn decode(name: &str, mut file: File) -> Result<FileSource, DecoderError> {
    file.rewind().map_err(|source| DecoderError::Open {
        name: name.to_string(),
        source,
    })?;

    rodio::Decoder::new(BufReader::new(file)).map_err(|e| DecoderError::Corrupt {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Read the tags and decode; runs on the blocking pool
fn open_source(stream: AssetStream) -> Result<(FileSource, Option<Duration>), DecoderError> {
    let AssetStream { name, mut file } = stream;

    let tagged = tagged_duration(&name, &mut file);
    let source = decode(&name, file)?;
    let duration = tagged.or_else(|| source.total_duration());

    Ok((source, duration))
}

#[async_trait]
impl Decoder for RodioDecoder {
    async fn prepare(&self) -> Result<Option<Duration>, DecoderError> {
        let stream = self
            .source
            .lock()
            .map_err(|_| DecoderError::Released)?
            .take()
            .ok_or(DecoderError::NotPrepared)?;

        let spare = stream.file.try_clone().map_err(|source| DecoderError::Open {
            name: self.name.clone(),
            source,
        })?;

        let name = self.name.clone();
        let (source, duration) = tokio::task::spawn_blocking(move || open_source(stream))
            .await
            .map_err(|e| DecoderError::Corrupt {
                name,
                reason: format!("decode task failed: {}", e),
            })??;

        if self.released.load(Ordering::SeqCst) {
            return Err(DecoderError::Released);
        }

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.append(source);

        *self.reopen.lock().map_err(|_| DecoderError::Released)? = Some(spare);
        *self.sink.lock().map_err(|_| DecoderError::Released)? = Some(Arc::new(sink));
        debug!("Prepared {} ({:?})", self.name, duration);
        Ok(duration)
    }

    fn play(&self) -> Result<(), DecoderError> {
        let sink = self.sink()?;
        self.refill(&sink)?;
        sink.play();
        Ok(())
    }

    fn pause(&self) -> Result<(), DecoderError> {
        self.sink()?.pause();
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<(), DecoderError> {
        let sink = self.sink()?;
        self.refill(&sink)?;
        // Waits for the output thread to apply the seek. It checks for one
        // every 5 ms of pulled audio, paused or not, so this only stalls
        // when the output device itself has stopped pulling.
        sink.try_seek(position)
            .map_err(|e| DecoderError::Seek(e.to_string()))
    }

    fn position(&self) -> Duration {
        self.sink().map(|sink| sink.get_pos()).unwrap_or_default()
    }

    fn is_finished(&self) -> bool {
        self.sink().map(|sink| sink.empty()).unwrap_or(false)
    }

    fn stop(&self) {
        if let Ok(sink) = self.sink() {
            sink.stop();
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        if let Ok(mut sink) = self.sink.lock()
            && let Some(sink) = sink.take()
        {
            sink.stop();
        }
        if let Ok(mut source) = self.source.lock() {
            source.take();
        }
        if let Ok(mut reopen) = self.reopen.lock() {
            reopen.take();
        }
        debug!("Released decoder for {}", self.name);
    }
}
