//! Log suppression while the terminal UI owns the screen
//!
//! Anything written to stderr in raw mode tears through the alternate
//! screen, so the fmt layer is gated on a process-wide flag.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

static TUI_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_tui_mode(enabled: bool) {
    TUI_MODE.store(enabled, Ordering::SeqCst);
}

pub fn is_tui_mode() -> bool {
    TUI_MODE.load(Ordering::SeqCst)
}

/// Keeps TUI mode on until dropped, including on early returns
pub struct TuiModeGuard(());

impl TuiModeGuard {
    pub fn enable() -> Self {
        set_tui_mode(true);
        Self(())
    }
}

impl Drop for TuiModeGuard {
    fn drop(&mut self) {
        set_tui_mode(false);
    }
}

/// Wraps a layer and mutes its output while TUI mode is on.
///
/// Span bookkeeping is always forwarded so spans opened before the UI
/// started still format correctly afterwards.
pub struct ConditionalStderrLayer<L> {
    inner: L,
}

impl<L> ConditionalStderrLayer<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<S, L> Layer<S> for ConditionalStderrLayer<L>
where
    S: Subscriber,
    L: Layer<S>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        self.inner.on_new_span(attrs, id, ctx);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        self.inner.on_record(id, values, ctx);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_event(event, ctx);
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_enter(id, ctx);
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if !is_tui_mode() {
            self.inner.on_exit(id, ctx);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        self.inner.on_close(id, ctx);
    }
}
