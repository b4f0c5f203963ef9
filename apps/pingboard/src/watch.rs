use crate::board::{render_board, status_line};
use crate::HostArgs;
use anyhow::{Context, Result};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use pingboard_model::{HostRecord, ProgressEvent};
use pingboard_monitor::{ProbeCoordinator, ReportOutcome, Reporter};
use pingboard_probe::{PingRunner, SystemPingRunner};
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const POLL: Duration = Duration::from_millis(50);

enum Action {
    Refresh,
    ForceRefresh,
    Quit,
}

fn action_for(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Action::Refresh),
        KeyCode::Char('f') => Some(Action::ForceRefresh),
        _ => None,
    }
}

pub fn run_watch(args: &HostArgs) -> Result<()> {
    let hosts = args.resolve()?;
    let (tx, rx) = mpsc::channel();
    let coordinator = ProbeCoordinator::new(hosts.clone(), &args.settings(), SystemPingRunner, tx)?;
    let mut reporter = Reporter::new(hosts.len());

    let mut stdout = io::stdout();
    enable_raw_mode().context("failed to enable raw terminal mode")?;
    execute!(stdout, EnterAlternateScreen, Hide)?;

    let result = watch_loop(&coordinator, &mut reporter, &rx, &hosts, &mut stdout);

    let _ = execute!(stdout, Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
    result
}

fn watch_loop<R: PingRunner + 'static>(
    coordinator: &ProbeCoordinator<R>,
    reporter: &mut Reporter,
    receiver: &Receiver<ProgressEvent>,
    hosts: &[HostRecord],
    out: &mut impl Write,
) -> Result<()> {
    reporter.begin_run(coordinator.refresh()?);
    let mut dirty = true;

    loop {
        while let Ok(event) = receiver.try_recv() {
            if reporter.apply(event) != ReportOutcome::Ignored {
                dirty = true;
            }
        }

        if dirty {
            draw(out, hosts, reporter)?;
            dirty = false;
        }

        if !event::poll(POLL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => match action_for(key) {
                Some(Action::Quit) => return Ok(()),
                // the board only accepts a plain refresh once the previous run is done
                Some(Action::Refresh) if reporter.is_complete() => {
                    reporter.begin_run(coordinator.refresh()?);
                    dirty = true;
                }
                Some(Action::ForceRefresh) => {
                    reporter.begin_run(coordinator.refresh()?);
                    dirty = true;
                }
                _ => {}
            },
            Event::Resize(_, _) => dirty = true,
            _ => {}
        }
    }
}

fn draw(out: &mut impl Write, hosts: &[HostRecord], reporter: &Reporter) -> Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    let board = render_board(hosts, reporter.rows());
    // raw mode: newlines do not return the cursor
    write!(out, "{}\r\n\r\n{}", board.replace('\n', "\r\n"), status_line(reporter))?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn keys_map_to_actions() {
        assert!(matches!(
            action_for(key(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(Action::Quit)
        ));
        assert!(matches!(
            action_for(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        ));
        assert!(matches!(
            action_for(key(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Some(Action::Refresh)
        ));
        assert!(matches!(
            action_for(key(KeyCode::Char('f'), KeyModifiers::NONE)),
            Some(Action::ForceRefresh)
        ));
        assert!(action_for(key(KeyCode::Char('c'), KeyModifiers::NONE)).is_none());
    }
}
