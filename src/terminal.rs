//! Local terminal handling for the CLI
//!
//! Raw mode, key-to-byte translation for the remote PTY, and no-echo
//! passphrase prompts, all on crossterm.

use std::io::Write;
use std::ops::ControlFlow;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use crate::session::SessionHandle;
use crate::types::{Result, WicketError};
use crate::vault::Passphrase;

/// Enables raw mode for its lifetime.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        enable_raw_mode().map_err(tty_error)?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// `Ctrl-]` ends an interactive session.
///
/// Unix terminals deliver byte 0x1D, which crossterm reports as `Ctrl-5`.
pub fn is_detach_key(key: &KeyEvent) -> bool {
    key.kind != KeyEventKind::Release
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char(']') | KeyCode::Char('5'))
}

/// Send typed or pasted input to `session`.
///
/// Breaks once the session has ended; input dropped before streaming does
/// not.
pub fn forward_input(session: &SessionHandle, input: String) -> ControlFlow<()> {
    match session.send_input(input) {
        Err(WicketError::SessionClosed) => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    }
}

/// Bytes a VT100-style terminal would send for `key`.
pub fn key_to_input(key: &KeyEvent) -> Option<String> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let seq = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return control_char(c).map(String::from);
        }
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::ALT) => {
            return Some(format!("\x1b{c}"));
        }
        KeyCode::Char(c) => return Some(c.to_string()),
        KeyCode::Enter => "\r",
        KeyCode::Tab => "\t",
        KeyCode::BackTab => "\x1b[Z",
        KeyCode::Backspace => "\x7f",
        KeyCode::Esc => "\x1b",
        KeyCode::Up => "\x1b[A",
        KeyCode::Down => "\x1b[B",
        KeyCode::Right => "\x1b[C",
        KeyCode::Left => "\x1b[D",
        KeyCode::Home => "\x1b[H",
        KeyCode::End => "\x1b[F",
        KeyCode::Insert => "\x1b[2~",
        KeyCode::Delete => "\x1b[3~",
        KeyCode::PageUp => "\x1b[5~",
        KeyCode::PageDown => "\x1b[6~",
        KeyCode::F(n @ 1..=4) => return Some(format!("\x1bO{}", (b'P' + n - 1) as char)),
        _ => return None,
    };
    Some(seq.to_string())
}

fn control_char(c: char) -> Option<char> {
    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => Some(((c as u8) - b'a' + 1) as char),
        ' ' | '@' | '2' => Some('\0'),
        '[' | '3' => Some('\x1b'),
        '\\' => Some('\x1c'),
        ']' => Some('\x1d'),
        '^' => Some('\x1e'),
        '_' => Some('\x1f'),
        // crossterm's Unix parser reports 0x1C..=0x1F as Ctrl-4..Ctrl-7
        c @ '4'..='7' => Some(((c as u8) - b'4' + 0x1c) as char),
        _ => None,
    }
}

/// Read a line from the terminal without echo. Blocking; run it on the
/// blocking pool from async code.
pub fn read_secret(prompt: &str) -> Result<Passphrase> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{prompt}").and_then(|()| stderr.flush()).map_err(tty_error)?;

    let guard = RawModeGuard::enable()?;
    let mut input = Passphrase::with_capacity(256);
    let result = loop {
        match event::read().map_err(tty_error)? {
            Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                KeyCode::Enter => break Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Err(WicketError::InvalidInput("Passphrase entry cancelled".into()));
                }
                KeyCode::Backspace => input.pop(),
                KeyCode::Char(c) => input.push(c),
                _ => {}
            },
            Event::Paste(text) => text.chars().for_each(|c| input.push(c)),
            _ => {}
        }
    };
    drop(guard);

    writeln!(stderr).map_err(tty_error)?;
    result.map(|()| input)
}

fn tty_error(err: std::io::Error) -> WicketError {
    WicketError::Internal(format!("Terminal error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn input(code: KeyCode, modifiers: KeyModifiers) -> Option<String> {
        key_to_input(&key(code, modifiers))
    }

    /// Event crossterm's Unix parser emits for a raw control byte.
    fn raw_control(byte: u8) -> KeyEvent {
        let c = match byte {
            0x01..=0x1a => (byte - 0x01 + b'a') as char,
            0x1c..=0x1f => (byte - 0x1c + b'4') as char,
            _ => unreachable!("not a control byte handled here"),
        };
        key(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_plain_and_special_keys() {
        assert_eq!(input(KeyCode::Char('x'), KeyModifiers::NONE).as_deref(), Some("x"));
        assert_eq!(input(KeyCode::Enter, KeyModifiers::NONE).as_deref(), Some("\r"));
        assert_eq!(input(KeyCode::Up, KeyModifiers::NONE).as_deref(), Some("\x1b[A"));
        assert_eq!(input(KeyCode::F(1), KeyModifiers::NONE).as_deref(), Some("\x1bOP"));
        assert_eq!(input(KeyCode::F(9), KeyModifiers::NONE), None);
    }

    #[test]
    fn test_control_keys() {
        assert_eq!(input(KeyCode::Char('c'), KeyModifiers::CONTROL).as_deref(), Some("\x03"));
        assert_eq!(input(KeyCode::Char('D'), KeyModifiers::CONTROL).as_deref(), Some("\x04"));
        assert_eq!(input(KeyCode::Char('b'), KeyModifiers::ALT).as_deref(), Some("\x1bb"));
    }

    #[test]
    fn test_raw_control_bytes_reach_remote() {
        // Ctrl-\ (SIGQUIT) through Ctrl-_ arrive as Ctrl-4..Ctrl-7
        for byte in 0x1c..=0x1fu8 {
            let sent = key_to_input(&raw_control(byte));
            assert_eq!(sent, Some((byte as char).to_string()), "byte {byte:#04x}");
        }
        assert_eq!(key_to_input(&raw_control(0x03)).as_deref(), Some("\x03"));
    }

    #[test]
    fn test_detach_key() {
        assert!(is_detach_key(&key(KeyCode::Char(']'), KeyModifiers::CONTROL)));
        assert!(is_detach_key(&raw_control(0x1d)));
        assert!(!is_detach_key(&key(KeyCode::Char(']'), KeyModifiers::NONE)));
        assert!(!is_detach_key(&key(KeyCode::Char('5'), KeyModifiers::NONE)));
        assert!(!is_detach_key(&raw_control(0x1c)));
    }
}
