//! Now-playing screen: headless controller plus its terminal front-end

pub mod controller;
pub mod terminal;
pub mod ui;

pub use controller::{PlayerScreen, ScreenTiming, ScreenView, UserAction};
pub use terminal::run_player;
