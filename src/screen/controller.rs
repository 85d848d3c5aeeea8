//! Now-playing screen controller
//!
//! Owns the current playback session and like state and is the only place
//! they are mutated. Slow work (decoder prepare, like reads and writes, the
//! post-seek settle delay) runs in spawned tasks that report back over an
//! internal channel; each report names the activation, decoder or settle it
//! was issued for, so anything that outlived a track change is dropped.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::library::{AssetStore, Catalog, Track};
use crate::likes::{LikeState, LikeSynchronizer, PendingToggle, ToggleOutcome};
use crate::playback::progress::parse_duration_label;
use crate::playback::{
    next_index, prev_index, DecoderError, DecoderFactory, PlaybackSession, PlaybackState,
    PrepareCompletion, Progress, SettleTicket,
};
use crate::store::StoreError;

/// Input from the front-end
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserAction {
    TogglePlay,
    /// Move the seek control to an absolute fraction
    SeekDrag(f64),
    /// Move the seek control relative to where it currently is
    SeekStep(f64),
    /// Let go of the seek control
    SeekRelease,
    Next,
    Previous,
    ToggleLike,
    /// Nothing changed but the view should be drawn again
    Refresh,
    Quit,
}

/// Completion reports from spawned work
#[derive(Debug)]
pub enum ScreenEvent {
    Prepared(PrepareCompletion),
    SettleElapsed(SettleTicket),
    LikeLoaded {
        activation: u64,
        state: LikeState,
    },
    LikeWritten {
        activation: u64,
        toggle: PendingToggle,
        result: Result<(), StoreError>,
    },
}

/// Timing knobs of the screen
#[derive(Debug, Clone, Copy)]
pub struct ScreenTiming {
    pub settle_delay: Duration,
    pub progress_interval: Duration,
    pub notice_timeout: Duration,
}

impl Default for ScreenTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(300),
            progress_interval: Duration::from_millis(1000),
            notice_timeout: Duration::from_millis(3000),
        }
    }
}

/// Snapshot of everything the front-end draws
#[derive(Debug, Clone)]
pub struct ScreenView {
    pub index: usize,
    pub total: usize,
    pub track: Option<Track>,
    pub state: PlaybackState,
    pub progress: Progress,
    pub seeking: bool,
    pub controls_enabled: bool,
    pub error: Option<String>,
    /// `None` until the flag has been loaded for the current track
    pub liked: Option<bool>,
    pub like_pending: bool,
    pub notice: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
}

struct Notice {
    message: String,
    expires: Instant,
}

/// The now-playing screen
pub struct PlayerScreen {
    catalog: Arc<Catalog>,
    assets: Arc<dyn AssetStore>,
    decoders: Arc<dyn DecoderFactory>,
    likes: LikeSynchronizer,
    timing: ScreenTiming,
    activation: u64,
    session: Option<PlaybackSession>,
    like: Option<LikeState>,
    notice: Option<Notice>,
    events_tx: mpsc::UnboundedSender<ScreenEvent>,
    events_rx: mpsc::UnboundedReceiver<ScreenEvent>,
}

impl PlayerScreen {
    pub fn new(
        catalog: Arc<Catalog>,
        assets: Arc<dyn AssetStore>,
        decoders: Arc<dyn DecoderFactory>,
        likes: LikeSynchronizer,
        timing: ScreenTiming,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            catalog,
            assets,
            decoders,
            likes,
            timing,
            activation: 0,
            session: None,
            like: None,
            notice: None,
            events_tx,
            events_rx,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.track_index())
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_index().and_then(|i| self.catalog.get(i))
    }

    pub fn is_playing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_playing())
    }

    /// Make `index` the current track.
    ///
    /// Out-of-range indices are ignored. The previous session is stopped and
    /// released before anything is opened for the new one.
    pub async fn activate(&mut self, index: usize) -> bool {
        let Some(track) = self.catalog.get(index).cloned() else {
            debug!("Ignoring activation of index {} (catalog has {})", index, self.catalog.len());
            return false;
        };

        if let Some(mut previous) = self.session.take() {
            previous.release();
        }
        self.like = None;
        self.activation += 1;
        let activation = self.activation;
        info!("Now playing {}/{}: {}", index + 1, self.catalog.len(), track.title);

        let opened = self
            .assets
            .open(&track.asset)
            .await
            .map_err(|source| DecoderError::Open {
                name: track.asset.clone(),
                source,
            })
            .and_then(|stream| self.decoders.open(stream));

        let hint = parse_duration_label(&track.duration_label).map(Duration::from_millis);
        let mut session = PlaybackSession::new(index).with_duration_hint(hint);
        if let Some(pending) = session.begin_load(opened) {
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                let completion = pending.run().await;
                let _ = tx.send(ScreenEvent::Prepared(completion));
            });
        }
        self.session = Some(session);

        let likes = self.likes.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let state = likes.load(&track).await;
            let _ = tx.send(ScreenEvent::LikeLoaded { activation, state });
        });

        true
    }

    /// Apply one user action; returns false once the screen should close
    pub async fn handle_action(&mut self, action: UserAction) -> bool {
        match action {
            UserAction::TogglePlay => {
                if let Some(session) = self.session.as_mut() {
                    session.toggle();
                }
            }
            UserAction::SeekDrag(fraction) => {
                if let Some(session) = self.session.as_mut() {
                    session.seek_drag(fraction);
                }
            }
            UserAction::SeekStep(delta) => {
                if let Some(session) = self.session.as_mut() {
                    let fraction = session.progress().fraction() + delta;
                    session.seek_drag(fraction);
                }
            }
            UserAction::SeekRelease => self.release_seek(),
            UserAction::Next => {
                if let Some(index) = self
                    .current_index()
                    .and_then(|i| next_index(i, self.catalog.len()))
                {
                    self.activate(index).await;
                }
            }
            UserAction::Previous => {
                if let Some(index) = self.current_index().and_then(prev_index) {
                    self.activate(index).await;
                }
            }
            UserAction::ToggleLike => self.toggle_like(),
            UserAction::Refresh => {}
            UserAction::Quit => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Apply one completion report
    pub fn handle_event(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::Prepared(completion) => {
                if let Some(session) = self.session.as_mut() {
                    session.complete_prepare(completion);
                }
            }
            ScreenEvent::SettleElapsed(ticket) => {
                if let Some(session) = self.session.as_mut() {
                    session.complete_settle(ticket);
                }
            }
            ScreenEvent::LikeLoaded { activation, state } => {
                if activation != self.activation {
                    debug!("Dropping like state for a previous track");
                    return;
                }
                self.like = Some(state);
            }
            ScreenEvent::LikeWritten {
                activation,
                toggle,
                result,
            } => {
                if activation != self.activation {
                    debug!("Like write for {} finished after track change", toggle.remote_key);
                    return;
                }
                let Some(like) = self.like.as_mut() else {
                    return;
                };
                if let ToggleOutcome::RolledBack { notice, .. } = like.finish_toggle(&toggle, result) {
                    self.set_notice(notice);
                }
            }
        }
    }

    /// Sample playback progress; called on the progress cadence
    pub fn poll_progress(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.poll_progress();
        }
    }

    /// Drop the transient notice once its timeout passed
    pub fn expire_notice(&mut self) {
        if self.notice.as_ref().is_some_and(|n| Instant::now() >= n.expires) {
            self.notice = None;
        }
    }

    /// Release the current session; the screen is done afterwards
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
        self.like = None;
    }

    pub fn view(&self) -> ScreenView {
        let index = self.current_index().unwrap_or(0);
        let total = self.catalog.len();
        let session = self.session.as_ref();

        ScreenView {
            index,
            total,
            track: self.current_track().cloned(),
            state: session.map(|s| s.state()).unwrap_or(PlaybackState::Idle),
            progress: session.map(|s| s.progress()).unwrap_or_default(),
            seeking: session.is_some_and(|s| s.is_seeking()),
            controls_enabled: session.is_some_and(|s| s.controls_enabled()),
            error: session.and_then(|s| s.error()).map(str::to_string),
            liked: self.like.as_ref().map(|l| l.liked),
            like_pending: self.like.as_ref().is_some_and(|l| l.pending),
            notice: self.notice.as_ref().map(|n| n.message.clone()),
            has_next: session.is_some() && next_index(index, total).is_some(),
            has_previous: session.is_some() && prev_index(index).is_some(),
        }
    }

    /// Event loop: user actions, completions, progress ticks and notice
    /// expiry, redrawing after each.
    pub async fn run<F>(
        &mut self,
        mut actions: mpsc::UnboundedReceiver<UserAction>,
        mut redraw: F,
    ) -> Result<()>
    where
        F: FnMut(&ScreenView) -> Result<()>,
    {
        let mut ticker = tokio::time::interval(self.timing.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        redraw(&self.view())?;

        loop {
            let playing = self.is_playing();
            let notice_deadline = self.notice.as_ref().map(|n| n.expires);

            tokio::select! {
                action = actions.recv() => {
                    let Some(action) = action else { break };
                    if !self.handle_action(action).await {
                        break;
                    }
                }
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = ticker.tick(), if playing => self.poll_progress(),
                _ = tokio::time::sleep_until(notice_deadline.unwrap_or_else(Instant::now)),
                    if notice_deadline.is_some() => {}
            }

            self.expire_notice();
            redraw(&self.view())?;
        }

        self.shutdown();
        Ok(())
    }

    fn release_seek(&mut self) {
        let Some(ticket) = self.session.as_mut().and_then(|s| s.seek_release()) else {
            return;
        };
        let tx = self.events_tx.clone();
        let delay = self.timing.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ScreenEvent::SettleElapsed(ticket));
        });
    }

    fn toggle_like(&mut self) {
        let Some(track) = self.current_track().cloned() else {
            return;
        };
        let Some(like) = self.like.as_mut() else {
            debug!("Like state for {} not loaded yet", track.title);
            return;
        };
        let Some(toggle) = like.begin_toggle() else {
            return;
        };

        let likes = self.likes.clone();
        let tx = self.events_tx.clone();
        let activation = self.activation;
        tokio::spawn(async move {
            let result = likes.write_liked(&track, &toggle).await;
            let _ = tx.send(ScreenEvent::LikeWritten {
                activation,
                toggle,
                result,
            });
        });
    }

    fn set_notice(&mut self, message: String) {
        self.notice = Some(Notice {
            message,
            expires: Instant::now() + self.timing.notice_timeout,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::DirAssetStore;
    use crate::playback::testing::FakeFactory;
    use crate::playback::Decoder;
    use crate::store::memory::MemoryStore;
    use crate::store::TrackRecord;
    use std::sync::atomic::Ordering;

    const SONG: Duration = Duration::from_secs(233);

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<MemoryStore>,
        factory: Arc<FakeFactory>,
        screen: PlayerScreen,
    }

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: id.to_string(),
            title: title.to_string(),
            artist: "Various".to_string(),
            album: "Hits".to_string(),
            year: "2019".to_string(),
            duration_label: "3:53".to_string(),
            artwork_ref: String::new(),
            liked: false,
            asset: format!("{}.mp3", title),
        }
    }

    fn fixture_with(factory: FakeFactory, store: MemoryStore, with_files: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let tracks = vec![track("s1", "Shape of You"), track("s2", "Blinding Lights")];
        if with_files {
            for t in &tracks {
                std::fs::write(dir.path().join(&t.asset), b"audio").unwrap();
            }
        }

        let store = Arc::new(store);
        let factory = Arc::new(factory);
        let assets = Arc::new(DirAssetStore::new(dir.path().to_path_buf(), &["mp3".to_string()]));
        let screen = PlayerScreen::new(
            Arc::new(Catalog::new(tracks)),
            assets,
            factory.clone(),
            LikeSynchronizer::new(store.clone(), None),
            ScreenTiming::default(),
        );

        Fixture {
            _dir: dir,
            store,
            factory,
            screen,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeFactory::new(SONG), MemoryStore::new(), true)
    }

    async fn pump(screen: &mut PlayerScreen, events: usize) {
        for _ in 0..events {
            let event = screen.events_rx.recv().await.unwrap();
            screen.handle_event(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_track_navigation() {
        let mut f = fixture();

        assert!(f.screen.activate(0).await);
        pump(&mut f.screen, 2).await;
        assert_eq!(f.screen.view().state, PlaybackState::Playing);
        assert!(!f.screen.view().has_previous);

        f.screen.handle_action(UserAction::Next).await;
        let decoders = f.factory.created();
        assert_eq!(decoders.len(), 2);
        assert!(decoders[0].is_released(), "old decoder released before the next loads");
        assert_eq!(f.screen.view().state, PlaybackState::Loading);

        pump(&mut f.screen, 2).await;
        let view = f.screen.view();
        assert_eq!(view.index, 1);
        assert_eq!(view.state, PlaybackState::Playing);
        assert_eq!(view.track.unwrap().title, "Blinding Lights");
        assert!(!view.has_next);

        f.screen.handle_action(UserAction::Next).await;
        assert_eq!(f.factory.created().len(), 2, "next at the end is a no-op");
        assert_eq!(f.screen.view().index, 1);

        f.screen.handle_action(UserAction::Previous).await;
        pump(&mut f.screen, 2).await;
        assert_eq!(f.screen.view().index, 0);
        assert!(f.factory.created()[1].is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_activation_ignored() {
        let mut f = fixture();
        assert!(!f.screen.activate(5).await);
        assert!(f.screen.current_index().is_none());
        assert!(f.factory.created().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_asset_leaves_controls_disabled() {
        let mut f = fixture_with(
            FakeFactory::new(SONG).with_corrupt("Shape of You.mp3"),
            MemoryStore::new(),
            true,
        );

        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        let view = f.screen.view();
        assert_eq!(view.state, PlaybackState::Idle);
        assert!(!view.controls_enabled);
        assert!(view.error.is_some());
        assert!(f.factory.created()[0].is_released());

        f.screen.handle_action(UserAction::TogglePlay).await;
        assert_eq!(f.screen.view().state, PlaybackState::Idle);

        // Navigation still works from a failed track
        f.screen.handle_action(UserAction::Next).await;
        pump(&mut f.screen, 2).await;
        assert_eq!(f.screen.view().state, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_asset_file_goes_idle() {
        let mut f = fixture_with(FakeFactory::new(SONG), MemoryStore::new(), false);

        f.screen.activate(0).await;
        assert_eq!(f.screen.view().state, PlaybackState::Idle);
        assert!(f.screen.view().error.is_some());
        assert!(f.factory.created().is_empty());

        // Only the like load reports back
        pump(&mut f.screen, 1).await;
        assert_eq!(f.screen.view().liked, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_resumes_after_settle_delay() {
        let mut f = fixture();
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        f.screen.handle_action(UserAction::SeekDrag(0.5)).await;
        let view = f.screen.view();
        assert!(view.seeking);
        assert_eq!(view.progress.elapsed_ms, 116_500);

        let released_at = Instant::now();
        f.screen.handle_action(UserAction::SeekRelease).await;
        assert_eq!(f.screen.view().state, PlaybackState::Seeking);
        let decoder = f.factory.created()[0].clone();
        assert!(!decoder.is_playing());

        pump(&mut f.screen, 1).await;
        assert!(released_at.elapsed() >= Duration::from_millis(300));
        assert_eq!(f.screen.view().state, PlaybackState::Playing);
        assert!(decoder.is_playing());
        assert_eq!(decoder.position(), Duration::from_millis(116_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_drag_supersedes_first_settle() {
        let mut f = fixture();
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        f.screen.handle_action(UserAction::SeekDrag(0.2)).await;
        f.screen.handle_action(UserAction::SeekRelease).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        f.screen.handle_action(UserAction::SeekDrag(0.8)).await;
        f.screen.handle_action(UserAction::SeekRelease).await;

        // First settle fires but is stale
        pump(&mut f.screen, 1).await;
        assert_eq!(f.screen.view().state, PlaybackState::Seeking);

        pump(&mut f.screen, 1).await;
        assert_eq!(f.screen.view().state, PlaybackState::Playing);
        assert_eq!(f.factory.created()[0].seek_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_duration_used_when_asset_has_none() {
        let mut f = fixture_with(FakeFactory::undeclared(), MemoryStore::new(), true);
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        let view = f.screen.view();
        assert_eq!(view.state, PlaybackState::Playing);
        assert_eq!(view.progress.duration_label(), "3:53");

        f.screen.handle_action(UserAction::SeekDrag(0.5)).await;
        f.screen.handle_action(UserAction::SeekRelease).await;
        assert_eq!(f.factory.created()[0].position(), Duration::from_millis(116_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_step_moves_from_current_position() {
        let mut f = fixture();
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        f.screen.handle_action(UserAction::SeekStep(0.05)).await;
        f.screen.handle_action(UserAction::SeekStep(0.05)).await;
        let progress = f.screen.view().progress;
        assert!((progress.fraction() - 0.1).abs() < 1e-3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_polling() {
        let mut f = fixture();
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        f.factory.created()[0].set_position(Duration::from_secs(60));
        f.screen.poll_progress();
        let view = f.screen.view();
        assert_eq!(view.progress.elapsed_label(), "1:00");
        assert_eq!(view.progress.duration_label(), "3:53");
    }

    #[tokio::test(start_paused = true)]
    async fn test_like_creates_document() {
        let mut f = fixture();
        f.screen.activate(0).await;

        // Not loaded yet: toggling does nothing
        f.screen.handle_action(UserAction::ToggleLike).await;
        pump(&mut f.screen, 2).await;
        assert_eq!(f.screen.view().liked, Some(false));
        assert_eq!(f.store.writes.load(Ordering::SeqCst), 0);

        let gate = f.store.gate_writes();
        f.screen.handle_action(UserAction::ToggleLike).await;
        let view = f.screen.view();
        assert_eq!(view.liked, Some(true));
        assert!(view.like_pending);

        f.screen.handle_action(UserAction::ToggleLike).await;
        assert_eq!(f.screen.view().liked, Some(true), "second toggle refused while pending");

        gate.notify_one();
        pump(&mut f.screen, 1).await;
        let view = f.screen.view();
        assert_eq!(view.liked, Some(true));
        assert!(!view.like_pending);
        assert!(f.store.document("s1").unwrap().liked);
        assert_eq!(f.store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_like_rollback_shows_notice() {
        let store = MemoryStore::with_tracks(vec![TrackRecord {
            id: "s1".to_string(),
            title: "Shape of You".to_string(),
            liked: true,
            ..Default::default()
        }]);
        store.fail_writes.store(true, Ordering::SeqCst);
        let mut f = fixture_with(FakeFactory::new(SONG), store, true);

        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;
        assert_eq!(f.screen.view().liked, Some(true));

        f.screen.handle_action(UserAction::ToggleLike).await;
        assert_eq!(f.screen.view().liked, Some(false));
        pump(&mut f.screen, 1).await;

        let view = f.screen.view();
        assert_eq!(view.liked, Some(true));
        assert!(view.notice.is_some());

        tokio::time::advance(Duration::from_secs(3)).await;
        f.screen.expire_notice();
        assert!(f.screen.view().notice.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_like_write_after_track_change_is_dropped() {
        let mut f = fixture();
        f.screen.activate(0).await;
        pump(&mut f.screen, 2).await;

        let gate = f.store.gate_writes();
        f.screen.handle_action(UserAction::ToggleLike).await;
        f.screen.handle_action(UserAction::Next).await;
        gate.notify_one();
        pump(&mut f.screen, 3).await;

        let view = f.screen.view();
        assert_eq!(view.index, 1);
        assert_eq!(view.liked, Some(false));
        assert!(!view.like_pending);
        assert!(f.store.document("s1").unwrap().liked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_quits_and_releases() {
        let mut f = fixture();
        f.screen.activate(0).await;

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(UserAction::Refresh).unwrap();
        tx.send(UserAction::Quit).unwrap();

        let mut frames = 0;
        f.screen
            .run(rx, |_| {
                frames += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert!(frames >= 2);
        assert!(f.screen.current_index().is_none());
        assert!(f.factory.created()[0].is_released());
    }
}
