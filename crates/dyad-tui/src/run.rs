//! Terminal setup and the cooperative event loop.
//!
//! One reader thread per connection decodes frames and posts them onto
//! the loop's channel; one-shot workers post single completion events.
//! The loop performs the effects `App::update` returns and feeds their
//! results back in as events.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use dyad_ride::{Client, Conn};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::app::{render, App, Effect, RideEvent, RideEventKind, UiEvent};
use crate::idioms::{fetch_idiom_table, IDIOM_TABLE_URL};

const INPUT_POLL: Duration = Duration::from_millis(50);

/// Move the client's read half onto a reader thread; the returned write
/// half stays with the loop.
fn spawn_reader(client: Client, tx: Sender<UiEvent>, gen: u64) -> Conn {
    let (conn, mut reader) = client.split();
    thread::spawn(move || loop {
        match reader.recv() {
            Ok(incoming) => {
                let event = UiEvent::Ride(RideEvent {
                    gen,
                    kind: RideEventKind::Incoming(incoming),
                });
                if tx.send(event).is_err() {
                    return;
                }
            }
            Err(err) => {
                let _ = tx.send(UiEvent::Ride(RideEvent {
                    gen,
                    kind: RideEventKind::Failed {
                        error: err.to_string(),
                    },
                }));
                return;
            }
        }
    });
    conn
}

pub fn run(app: &mut App, client: Client) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut conn = Some(spawn_reader(client, tx.clone(), app.gen));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(app, &mut terminal, &rx, &tx, &mut conn);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

fn event_loop(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    rx: &Receiver<UiEvent>,
    tx: &Sender<UiEvent>,
    conn: &mut Option<Conn>,
) -> anyhow::Result<()> {
    loop {
        // Drain protocol and worker events first, then draw, then poll
        // the terminal with a short timeout so the loop stays live.
        while let Ok(ui_event) = rx.try_recv() {
            let effects = app.update(ui_event);
            if perform_effects(app, effects, conn, tx)? {
                return Ok(());
            }
        }

        terminal.draw(|frame| render(app, frame))?;

        if event::poll(INPUT_POLL)? {
            let ui_event = match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => Some(UiEvent::Key(key)),
                Event::Mouse(mouse) => Some(UiEvent::Mouse(mouse)),
                Event::Resize(w, h) => Some(UiEvent::Resize(w, h)),
                _ => None,
            };
            if let Some(ui_event) = ui_event {
                let effects = app.update(ui_event);
                if perform_effects(app, effects, conn, tx)? {
                    return Ok(());
                }
            }
        }
    }
}

/// Perform requested effects. Returns true when the loop should exit.
fn perform_effects(
    app: &mut App,
    effects: Vec<Effect>,
    conn: &mut Option<Conn>,
    tx: &Sender<UiEvent>,
) -> anyhow::Result<bool> {
    for effect in effects {
        match effect {
            Effect::Send { name, args } => {
                let Some(active) = conn.as_mut() else {
                    app.on_send_failed("no connection");
                    continue;
                };
                if let Err(err) = active.send(&name, args) {
                    app.on_send_failed(&err.to_string());
                }
            }
            Effect::Reconnect => {
                if perform_reconnect(app, conn, tx)? {
                    return Ok(true);
                }
            }
            Effect::FetchIdioms => {
                let tx = tx.clone();
                thread::spawn(move || {
                    let result = fetch_idiom_table(IDIOM_TABLE_URL);
                    let _ = tx.send(UiEvent::IdiomsLoaded(result));
                });
            }
            Effect::WriteFile { path, contents } => match std::fs::write(&path, contents) {
                Ok(()) => app.log(format!("Session saved to {}", path.display())),
                Err(err) => app.log(format!("Failed to save session: {err}")),
            },
            Effect::Quit => return Ok(true),
        }
    }
    Ok(false)
}

fn perform_reconnect(
    app: &mut App,
    conn: &mut Option<Conn>,
    tx: &Sender<UiEvent>,
) -> anyhow::Result<bool> {
    if let Some(mut old) = conn.take() {
        old.shutdown();
    }
    // Stale reader events from the old connection are filtered by
    // generation.
    app.gen += 1;
    app.log(format!("Reconnecting to {}...", app.addr));

    match Client::connect(&app.addr) {
        Ok(client) => {
            *conn = Some(spawn_reader(client, tx.clone(), app.gen));
            let effects = app.on_reconnected();
            perform_effects(app, effects, conn, tx)
        }
        Err(err) => {
            app.on_reconnect_failed(&err.to_string());
            Ok(false)
        }
    }
}
