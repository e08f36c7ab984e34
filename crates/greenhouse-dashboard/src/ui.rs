use crate::app::App;
use crate::theme::{greenhouse_theme, icons, marker_color, status_note_color, GreenhouseTheme, SELECTED_BORDER};
use greenhouse_core::view::{CardNode, SwitchNode};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const CARD_HEIGHT: u16 = 7;

pub fn render_ui(frame: &mut Frame, app: &App) {
    let size = frame.size();
    let theme = greenhouse_theme();
    let bulk_height = if app.dashboard.panel().is_visible() { 4 } else { 0 };
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(bulk_height),
            Constraint::Min(0),
        ])
        .split(size);

    frame.render_widget(render_header(app, theme), layout[0]);
    if bulk_height > 0 {
        frame.render_widget(render_bulk_panel(app, theme), layout[1]);
    }
    if app.dashboard.view().is_empty() {
        frame.render_widget(render_placeholder(app, theme), layout[2]);
    } else {
        render_cards(frame, app, theme, layout[2]);
    }
    if app.help_open {
        render_help_overlay(frame, theme);
    }
}

fn panel_block(title: &str, theme: GreenhouseTheme) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.bg))
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_header(app: &App, theme: GreenhouseTheme) -> Paragraph<'static> {
    let channel = if app.connected { "online" } else { "offline" };
    let status_line = format!(
        "Channel: {channel} ({})  Groups: {}  Delayed: {}",
        app.addr,
        app.dashboard.store().len(),
        app.dashboard.scheduler().delayed_count()
    );
    let note = app.dashboard.status_note();
    let action_text = format!("Last Action: {}", note.unwrap_or("ready (? help)"));

    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            status_line,
            Style::default().fg(if app.connected { theme.text } else { theme.warn }),
        )),
        Line::from(Span::styled(
            action_text,
            Style::default().fg(note
                .map(|note| status_note_color(note, theme))
                .unwrap_or(theme.muted)),
        )),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel_block("Greenhouses", theme))
}

fn render_bulk_panel(app: &App, theme: GreenhouseTheme) -> Paragraph<'static> {
    let panel = app.dashboard.panel();
    let weather = if panel.weather_text().is_empty() {
        "press r to fetch".to_string()
    } else {
        panel.weather_text().to_string()
    };
    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(
            "A all auto  M all manual  O lights on  F lights off  r weather",
            Style::default().fg(theme.muted),
        )),
        Line::from(vec![
            Span::styled("Weather: ", Style::default().fg(theme.accent)),
            Span::styled(
                weather,
                Style::default().fg(marker_color(panel.weather_marker(), theme)),
            ),
        ]),
    ]))
    .block(panel_block("All Groups", theme))
}

fn render_placeholder(app: &App, theme: GreenhouseTheme) -> Paragraph<'static> {
    let loading = app.dashboard.loading();
    let text = if loading.is_visible() {
        format!("Waiting for greenhouse data... {}", loading.remaining())
    } else {
        "No greenhouse groups reported".to_string()
    };
    Paragraph::new(Line::from(Span::styled(text, Style::default().fg(theme.muted))))
        .block(panel_block("Groups", theme))
}

fn render_cards(frame: &mut Frame, app: &App, theme: GreenhouseTheme, area: Rect) {
    let fits = usize::from((area.height / CARD_HEIGHT).max(1));
    let offset = app.selected.saturating_sub(fits - 1);
    let cards: Vec<&CardNode> = app.dashboard.view().cards().skip(offset).take(fits).collect();

    let slots = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            cards
                .iter()
                .map(|_| Constraint::Length(CARD_HEIGHT))
                .chain(std::iter::once(Constraint::Min(0)))
                .collect::<Vec<_>>(),
        )
        .split(area);

    for (index, card) in cards.into_iter().enumerate() {
        let selected = offset + index == app.selected;
        frame.render_widget(render_card(card, selected, theme), slots[index]);
    }
}

fn render_card(card: &CardNode, selected: bool, theme: GreenhouseTheme) -> Paragraph<'static> {
    let mut title = card.id().to_string();
    if card.is_locked() {
        title.push_str(&format!(" {}", icons::LOCKED));
    }
    let mut block = panel_block(&title, theme);
    if selected {
        block = block.border_style(SELECTED_BORDER);
    }

    let mode_line = Line::from(vec![
        Span::styled("Mode ", Style::default().fg(theme.muted)),
        switch_span(card.mode_switch(), false, theme),
        Span::styled(
            format!(" {}", card.mode_text().text()),
            Style::default().fg(theme.accent),
        ),
    ]);

    let door = card.door();
    let door_text = match door.marker() {
        Some(_) => format!("{} {}", door.text(), icons::ALERT),
        None => door.text().to_string(),
    };
    let readings_line = Line::from(vec![
        Span::styled("Temp ", Style::default().fg(theme.muted)),
        Span::raw(card.temperature().text().to_string()),
        Span::styled("  Humidity ", Style::default().fg(theme.muted)),
        Span::raw(card.humidity().text().to_string()),
        Span::styled("  Door ", Style::default().fg(theme.muted)),
        Span::styled(door_text, Style::default().fg(marker_color(door.marker(), theme))),
    ]);

    let mut device_spans = Vec::new();
    for switch in card.devices() {
        let dimmed = switch.is_manual_only() && card.manual_section_disabled();
        device_spans.push(Span::styled(
            format!("{} ", switch.label()),
            Style::default().fg(if dimmed { theme.muted } else { theme.text }),
        ));
        device_spans.push(switch_span(switch, dimmed, theme));
        device_spans.push(Span::raw("  "));
    }

    let timer = card.timer();
    let timer_line = Line::from(vec![
        Span::styled("Next update ", Style::default().fg(theme.muted)),
        Span::styled(
            timer.text().to_string(),
            Style::default().fg(marker_color(timer.marker(), theme)),
        ),
    ]);

    let result = card.result();
    let result_line = Line::from(vec![
        Span::styled("Suggestion ", Style::default().fg(theme.muted)),
        Span::styled(
            if result.is_empty() {
                "press w".to_string()
            } else {
                result.text().to_string()
            },
            Style::default().fg(if result.is_empty() {
                theme.muted
            } else {
                marker_color(result.marker(), theme)
            }),
        ),
    ]);

    Paragraph::new(Text::from(vec![
        mode_line,
        readings_line,
        Line::from(device_spans),
        timer_line,
        result_line,
    ]))
    .style(Style::default().fg(theme.text).bg(theme.surface))
    .block(block)
}

fn switch_span(switch: &SwitchNode, dimmed: bool, theme: GreenhouseTheme) -> Span<'static> {
    let glyph = if switch.is_checked() {
        icons::SWITCH_ON
    } else {
        icons::SWITCH_OFF
    };
    let color = if switch.is_disabled() || dimmed {
        theme.muted
    } else if switch.is_checked() {
        theme.ok
    } else {
        theme.text
    };
    Span::styled(glyph, Style::default().fg(color))
}

fn render_help_overlay(frame: &mut Frame, theme: GreenhouseTheme) {
    let area = centered_rect(70, 70, frame.size());
    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let lines = vec![
        heading("Selected Group"),
        Line::from("  j/k      select group"),
        Line::from("  m        toggle auto/manual"),
        Line::from("  l        toggle light"),
        Line::from("  f/s      toggle fan/sprinkler (manual mode only)"),
        Line::from("  w        ask for a weather suggestion"),
        Line::from(""),
        heading("All Groups (two or more groups)"),
        Line::from("  A/M      set every group to auto/manual"),
        Line::from("  O/F      turn every light on/off"),
        Line::from("  r        refresh global weather"),
        Line::from(""),
        heading("Exit"),
        Line::from("  ? or F1  toggle this help"),
        Line::from("  Esc      close help"),
        Line::from("  q        quit"),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel_block("Help", theme).style(Style::default().bg(theme.surface)))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}
