use greenhouse_core::view::Marker;
use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Copy)]
pub struct GreenhouseTheme {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub info: Color,
}

pub fn greenhouse_theme() -> GreenhouseTheme {
    GreenhouseTheme {
        bg: Color::Rgb(12, 20, 16),
        surface: Color::Rgb(20, 31, 25),
        border: Color::Rgb(74, 98, 82),
        title: Color::Rgb(187, 247, 208),
        text: Color::Rgb(226, 236, 229),
        muted: Color::Rgb(140, 160, 148),
        accent: Color::Rgb(74, 222, 128),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
        info: Color::Rgb(56, 189, 248),
    }
}

pub const SELECTED_BORDER: Style = Style::new()
    .fg(Color::Rgb(74, 222, 128))
    .add_modifier(Modifier::BOLD);

pub mod icons {
    pub const SWITCH_ON: &str = "[x]";
    pub const SWITCH_OFF: &str = "[ ]";
    pub const LOCKED: &str = "~";
    pub const ALERT: &str = "!";
}

pub fn marker_color(marker: Option<Marker>, theme: GreenhouseTheme) -> Color {
    match marker {
        Some(Marker::Alert) => theme.critical,
        Some(Marker::Delayed) => theme.warn,
        Some(Marker::Pending) => theme.info,
        None => theme.text,
    }
}

pub fn status_note_color(note: &str, theme: GreenhouseTheme) -> Color {
    let lower = note.to_ascii_lowercase();
    if lower.contains("offline") || lower.contains("not sent") {
        theme.critical
    } else if lower.contains("waiting") || lower.contains("manual only") || lower.contains("need") {
        theme.warn
    } else if lower.contains("sent") || lower.contains("connected") {
        theme.ok
    } else {
        theme.muted
    }
}
