use crate::view::Marker;

/// The bulk-control panel appears once this many groups are tracked.
pub const BULK_PANEL_MIN_GROUPS: usize = 2;
pub const INITIAL_LOADING_TICKS: u32 = 10;
pub const PENDING_WEATHER_TEXT: &str = "Fetching weather data...";

pub fn bulk_panel_visible(group_count: usize) -> bool {
    group_count >= BULK_PANEL_MIN_GROUPS
}

/// Dashboard-wide controls: visibility of the bulk panel and the global
/// weather slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalPanel {
    visible: bool,
    weather_text: String,
    weather_marker: Option<Marker>,
}

impl GlobalPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when visibility flipped.
    pub fn recompute(&mut self, group_count: usize) -> bool {
        let visible = bulk_panel_visible(group_count);
        let changed = visible != self.visible;
        self.visible = visible;
        changed
    }

    pub fn begin_weather_request(&mut self) {
        self.weather_text = PENDING_WEATHER_TEXT.to_string();
        self.weather_marker = Some(Marker::Pending);
    }

    pub fn apply_weather_result(&mut self, message: &str) {
        self.weather_text = message.to_string();
        self.weather_marker = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn weather_text(&self) -> &str {
        &self.weather_text
    }

    pub fn weather_marker(&self) -> Option<Marker> {
        self.weather_marker
    }
}

/// Startup placeholder shown until the first snapshot arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingIndicator {
    visible: bool,
    remaining: u32,
}

impl Default for LoadingIndicator {
    fn default() -> Self {
        Self {
            visible: true,
            remaining: INITIAL_LOADING_TICKS,
        }
    }
}

impl LoadingIndicator {
    pub fn tick(&mut self) {
        if self.visible {
            self.remaining = self.remaining.saturating_sub(1);
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}
