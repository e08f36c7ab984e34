use crate::channel::{ChannelEvent, CommandQueue};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use greenhouse_core::dashboard::Dashboard;
use greenhouse_core::intent::{DispatchOutcome, Interaction};
use greenhouse_core::view::CardNode;
use greenhouse_core::{DeviceState, Mode};
use tracing::info;

pub struct App {
    pub dashboard: Dashboard,
    pub addr: String,
    pub connected: bool,
    pub selected: usize,
    pub help_open: bool,
    commands: CommandQueue,
}

impl App {
    pub fn new(addr: String, commands: CommandQueue) -> Self {
        Self {
            dashboard: Dashboard::new(),
            addr,
            connected: false,
            selected: 0,
            help_open: false,
            commands,
        }
    }

    pub fn apply_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.connected = true;
                self.dashboard
                    .set_status_note(format!("connected to {}", self.addr));
            }
            ChannelEvent::Disconnected => {
                if self.connected {
                    info!(event = "channel_offline", addr = %self.addr);
                }
                self.connected = false;
                self.dashboard
                    .set_status_note("channel offline; showing last known state");
            }
            ChannelEvent::Message(msg) => {
                self.dashboard.apply_inbound(msg);
                self.clamp_selection();
            }
        }
    }

    pub fn tick(&mut self) {
        self.dashboard.tick();
    }

    pub fn selected_card(&self) -> Option<&CardNode> {
        self.dashboard.view().card_at(self.selected)
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.dashboard.view().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + delta;
        self.selected = next.clamp(0, len as isize - 1) as usize;
    }

    pub fn toggle_selected_mode(&mut self) -> Option<DispatchOutcome> {
        let card = self.selected_card()?;
        let id = card.id().to_string();
        if !card.accepts_mode_toggle() {
            self.dashboard
                .set_status_note(format!("{id} is waiting for the server"));
            return None;
        }
        let checked = !card.mode_switch().is_checked();
        self.submit(Interaction::ModeToggled {
            group_id: Some(id),
            checked,
        })
    }

    pub fn toggle_selected_device(&mut self, device: &str) -> Option<DispatchOutcome> {
        let card = self.selected_card()?;
        let id = card.id().to_string();
        let switch = card.device(device)?;
        if !card.accepts_device_toggle(device) {
            let note = if switch.is_manual_only() && card.manual_section_disabled() {
                format!("{} on {id} is manual only; switch to manual first", switch.label())
            } else {
                format!("{id} is waiting for the server")
            };
            self.dashboard.set_status_note(note);
            return None;
        }
        let checked = !switch.is_checked();
        self.submit(Interaction::DeviceToggled {
            group_id: Some(id),
            device: device.to_string(),
            checked,
        })
    }

    pub fn request_selected_weather(&mut self) -> Option<DispatchOutcome> {
        let id = self.selected_card()?.id().to_string();
        self.submit(Interaction::WeatherSuggestionRequested { group_id: Some(id) })
    }

    /// Bulk actions are only offered while the panel is visible.
    pub fn submit_global(&mut self, interaction: Interaction) -> Option<DispatchOutcome> {
        if !self.dashboard.panel().is_visible() {
            self.dashboard
                .set_status_note("bulk controls need more than one group");
            return None;
        }
        self.submit(interaction)
    }

    fn submit(&mut self, interaction: Interaction) -> Option<DispatchOutcome> {
        if !self.connected {
            self.dashboard
                .set_status_note("channel offline; command unavailable");
            return None;
        }
        self.dashboard.interact(interaction, &mut self.commands).ok()
    }

    fn clamp_selection(&mut self) {
        let len = self.dashboard.view().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

pub fn handle_input(event: Event, app: &mut App) -> bool {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(key, app),
        _ => false,
    }
}

/// Returns true when the user asked to quit.
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
        app.help_open = !app.help_open;
        return false;
    }
    if key.code == KeyCode::Esc && app.help_open {
        app.help_open = false;
        return false;
    }
    if app.help_open {
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Char('m') => {
            app.toggle_selected_mode();
        }
        KeyCode::Char('l') => {
            app.toggle_selected_device("light");
        }
        KeyCode::Char('f') => {
            app.toggle_selected_device("fan");
        }
        KeyCode::Char('s') => {
            app.toggle_selected_device("sprinkler");
        }
        KeyCode::Char('w') => {
            app.request_selected_weather();
        }
        KeyCode::Char('A') => {
            app.submit_global(Interaction::GlobalModeSelected { mode: Mode::Auto });
        }
        KeyCode::Char('M') => {
            app.submit_global(Interaction::GlobalModeSelected { mode: Mode::Manual });
        }
        KeyCode::Char('O') => {
            app.submit_global(Interaction::GlobalDeviceCommand {
                device: "light".to_string(),
                command: DeviceState::On,
            });
        }
        KeyCode::Char('F') => {
            app.submit_global(Interaction::GlobalDeviceCommand {
                device: "light".to_string(),
                command: DeviceState::Off,
            });
        }
        KeyCode::Char('r') => {
            app.submit_global(Interaction::GlobalWeatherRefresh);
        }
        _ => {}
    }
    false
}
