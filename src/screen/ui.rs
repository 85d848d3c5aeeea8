//! ratatui rendering of the now-playing view

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use super::controller::ScreenView;
use crate::playback::PlaybackState;

/// Draw the whole screen
pub fn draw_player(f: &mut Frame, view: &ScreenView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Artwork
            Constraint::Min(5),    // Track info
            Constraint::Length(3), // Seek bar
            Constraint::Length(3), // Status
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    draw_header(f, view, chunks[0]);

    let Some(track) = &view.track else {
        let area = centered_rect(60, 5, f.area());
        f.render_widget(Clear, area);
        let empty = Paragraph::new("No playable tracks. Check the assets directory and store URL.")
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().title("Empty catalog").borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    };

    let artwork = if track.artwork_ref.is_empty() {
        "(no artwork)".to_string()
    } else {
        track.artwork_ref.clone()
    };
    let artwork = Paragraph::new(artwork)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().title("Artwork").borders(Borders::ALL));
    f.render_widget(artwork, chunks[1]);

    let like = match (view.liked, view.like_pending) {
        (None, _) => Span::styled("…", Style::default().fg(Color::DarkGray)),
        (Some(true), pending) => Span::styled(
            if pending { "♥ saving" } else { "♥ liked" },
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        (Some(false), pending) => Span::styled(
            if pending { "♡ saving" } else { "♡" },
            Style::default().fg(Color::Gray),
        ),
    };

    let info = vec![
        Line::from(vec![
            Span::styled(
                track.title.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            like,
        ]),
        Line::from(track.artist.clone()),
        Line::from(album_line(&track.album, &track.year)),
    ];
    let info = Paragraph::new(info)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(info, chunks[2]);

    let gauge_style = if view.seeking {
        Style::default().fg(Color::Yellow)
    } else if view.controls_enabled {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let seek = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(gauge_style)
        .ratio(view.progress.fraction().clamp(0.0, 1.0))
        .label(format!(
            "{} / {}",
            view.progress.elapsed_label(),
            view.progress.duration_label()
        ));
    f.render_widget(seek, chunks[3]);

    draw_status(f, view, chunks[4]);

    let help = Paragraph::new(
        "space: play/pause | n/p: next/prev | ←/→: seek | enter: commit seek | l: like | q: quit",
    )
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(help, chunks[5]);
}

fn draw_header(f: &mut Frame, view: &ScreenView, area: Rect) {
    let text = if view.total == 0 {
        "tunedeck".to_string()
    } else {
        format!("tunedeck - Now Playing ({}/{})", view.index + 1, view.total)
    };
    let header = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, area);
}

fn draw_status(f: &mut Frame, view: &ScreenView, area: Rect) {
    let (text, style) = if let Some(notice) = &view.notice {
        (notice.clone(), Style::default().fg(Color::Yellow))
    } else if let Some(error) = &view.error {
        (format!("Can't play this track: {}", error), Style::default().fg(Color::Red))
    } else {
        let mut text = view.state.label().to_string();
        if view.state == PlaybackState::Loading {
            text.push_str("...");
        }
        let nav = match (view.has_previous, view.has_next) {
            (true, true) => "  ◀ ▶",
            (true, false) => "  ◀",
            (false, true) => "  ▶",
            (false, false) => "",
        };
        text.push_str(nav);
        (text, Style::default().fg(Color::White))
    };

    let status = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

/// "Album: X (year)", leaving out whatever is unknown
pub fn album_line(album: &str, year: &str) -> String {
    match (album.trim(), year.trim()) {
        ("", "") => String::new(),
        (album, "") => format!("Album: {}", album),
        ("", year) => format!("({})", year),
        (album, year) => format!("Album: {} ({})", album, year),
    }
}

/// Create a centered rect
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
