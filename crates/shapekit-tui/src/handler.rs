use anyhow::{anyhow, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use shapekit_core::config::ClientSettings;

use crate::app::{App, InputMode, NetEvent, Screen};
use crate::tui::AppEvent;

/// `Err` means the UI can no longer trust its state; the caller shows the error screen.
pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Net(event) => return handle_net(app, event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.fatal_error.is_some() {
        match key.code {
            KeyCode::Char('r') | KeyCode::Enter => app.reset(),
            KeyCode::Char('q') => app.should_quit = true,
            _ => {}
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Screen switching
        KeyCode::Tab => app.set_screen(app.screen.next()),
        KeyCode::BackTab => app.set_screen(app.screen.prev()),

        KeyCode::Char('w') => app.connect_wallet(),

        KeyCode::Char('i') | KeyCode::Enter if app.screen != Screen::Nfts => {
            app.input_mode = InputMode::Editing;
        }

        _ => match app.screen {
            Screen::Chat => handle_chat_normal(app, key),
            Screen::Nfts => handle_nfts_normal(app, key),
            Screen::Analytics => handle_analytics_normal(app, key),
            Screen::Greet => {
                if key.code == KeyCode::Char('r') {
                    app.refresh_status(true);
                }
            }
        },
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Suggested prompts only show on an empty conversation
        KeyCode::Char(c @ '1'..='4') if app.chat_messages.is_empty() && app.wallet.is_some() => {
            let index = c as usize - '1' as usize;
            app.use_suggestion(index);
        }

        KeyCode::Char('m') => app.mint(),
        KeyCode::Char('x') => app.dismiss_mint(),

        KeyCode::Char('j') | KeyCode::Down => app.chat_scroll = app.chat_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.chat_scroll = app.chat_scroll.saturating_sub(1),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('r') => app.refresh_status(true),
        _ => {}
    }
}

fn handle_nfts_normal(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('r') {
        app.fetch_nfts(true);
    }
}

fn handle_analytics_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('l') | KeyCode::Right => app.next_analytics(),
        KeyCode::Char('h') | KeyCode::Left => app.prev_analytics(),
        KeyCode::Char('r') => app.run_analytics(),
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => submit(app),
        KeyCode::Backspace => {
            if input_enabled(app) {
                app.input_mut().pop();
            }
        }
        KeyCode::Char(c) => {
            if input_enabled(app) {
                app.input_mut().push(c);
            }
        }
        _ => {}
    }
}

/// The chat box is read-only while a request is in flight.
fn input_enabled(app: &App) -> bool {
    match app.screen {
        Screen::Chat => app.chat_status.accepts_input(),
        Screen::Greet => !app.greet.is_loading(),
        Screen::Analytics => !app.analytics.is_loading(),
        Screen::Nfts => false,
    }
}

fn submit(app: &mut App) {
    match app.screen {
        Screen::Chat => {
            app.submit_chat();
        }
        Screen::Analytics => {
            app.run_analytics();
            app.input_mode = InputMode::Normal;
        }
        Screen::Greet => {
            app.run_greet();
            app.input_mode = InputMode::Normal;
        }
        Screen::Nfts => app.input_mode = InputMode::Normal,
    }
}

fn handle_net(app: &mut App, event: NetEvent) -> Result<()> {
    match event {
        NetEvent::Status(Ok(status)) => app.apply_status(status),
        NetEvent::Status(Err(e)) => {
            tracing::warn!("status check failed: {}", e);
            app.apply_status(shapekit_core::McpStatusResponse {
                success: false,
                error: Some(e),
                ..Default::default()
            });
        }

        NetEvent::Balance { address, result } => match result {
            Ok(wei) => app.apply_balance(&address, wei),
            Err(e) => tracing::warn!(%address, "balance fetch failed: {}", e),
        },

        NetEvent::Nfts { address, result } => app.apply_nfts(&address, result),
        NetEvent::Analytics { kind, result } => app.apply_analytics(kind, result),
        NetEvent::Greet(result) => app.apply_greet(result),

        NetEvent::Chat(event) => app.apply_chat_event(event),
        NetEvent::ChatEnded(failure) => {
            // A stream that closes without `finish` still settles the request.
            app.finish_chat(failure);
        }

        NetEvent::Accounts(Ok(accounts)) => {
            if let Some(address) = accounts.into_iter().next() {
                if app.remember_wallet {
                    if let Err(e) = ClientSettings::save_wallet_address(&address) {
                        tracing::warn!("could not save wallet address: {}", e);
                    }
                }
                app.set_wallet(address);
            }
        }
        NetEvent::Accounts(Err(e)) => app.wallet_failed(e),

        NetEvent::MintSent { result: Ok(hash), .. } => {
            tracing::info!(%hash, "mint submitted, waiting for receipt")
        }
        NetEvent::MintSent { attempt, result } | NetEvent::MintConfirmed { attempt, result } => {
            app.apply_mint_result(attempt, result)
        }

        NetEvent::Crashed(e) => return Err(anyhow!("Background task failed: {}", e)),
    }
    Ok(())
}
