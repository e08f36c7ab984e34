mod app;
mod channel;
mod config;
mod logging;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::{handle_input, App};
use channel::{channel_loop, CommandQueue, COMMAND_QUEUE_CAPACITY, EVENT_QUEUE_CAPACITY};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use greenhouse_core::staleness::TICK_PERIOD;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config()?;
    let _log_guard = logging::init_logging(&config);
    info!(
        event = "dashboard_start",
        addr = %config.addr(),
        client_id = %config.client_id
    );

    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (event_tx, mut event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let mut app = App::new(config.addr(), CommandQueue::new(command_tx));
    tokio::spawn(channel_loop(config, event_tx, command_rx));

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("create terminal")?;

    let outcome = run(&mut terminal, &mut app, &mut event_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    info!(event = "dashboard_stop");
    outcome
}

async fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    event_rx: &mut mpsc::Receiver<channel::ChannelEvent>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + TICK_PERIOD, TICK_PERIOD);

    loop {
        terminal.draw(|frame| ui::render_ui(frame, app))?;
        tokio::select! {
            _ = ticker.tick() => {
                app.tick();
            }
            Some(event) = event_rx.recv() => {
                app.apply_channel_event(event);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if handle_input(event, app) {
                            return Ok(());
                        }
                    }
                    Some(Err(err)) => return Err(err).context("read terminal event"),
                    None => return Ok(()),
                }
            }
        }
    }
}
