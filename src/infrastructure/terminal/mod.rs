// Terminal module - Console display and keystroke capture
use crate::core::stream::{ByteSink, ByteSource};
use crate::domain::error::TermLinkResult;
use async_trait::async_trait;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Out-of-band requests from the keyboard that are never forwarded to
/// the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    /// Ctrl-] - disconnect the session
    Disconnect,
    /// Ctrl-E - toggle local echo
    ToggleEcho,
}

/// Byte sink rendering raw bytes to stdout.
pub struct ConsoleDisplay;

#[async_trait]
impl ByteSink for ConsoleDisplay {
    async fn write(&self, chunk: &[u8]) -> TermLinkResult<()> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(chunk)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Byte source fed by a dedicated crossterm event-reading thread.
///
/// Key events are translated to the bytes a terminal would put on the
/// wire; reserved chords become [`UiCommand`]s on a separate channel.
/// The source ends when the event thread stops.
pub struct KeyboardSource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl KeyboardSource {
    /// Spawn the event-reading thread. UI commands are delivered on
    /// `commands`; everything else arrives as bytes from `read`.
    pub fn spawn(commands: mpsc::UnboundedSender<UiCommand>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || loop {
            match crossterm::event::read() {
                Ok(Event::Key(key)) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    match translate_key(&key) {
                        KeyAction::Bytes(bytes) => {
                            if tx.send(bytes).is_err() {
                                break;
                            }
                        }
                        KeyAction::Command(command) => {
                            if commands.send(command).is_err() {
                                break;
                            }
                        }
                        KeyAction::Ignore => {}
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Keyboard event read failed: {}", e);
                    break;
                }
            }
        });

        debug!("Keyboard reader started");
        Self { rx }
    }
}

#[async_trait]
impl ByteSource for KeyboardSource {
    async fn read(&mut self) -> TermLinkResult<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Bytes(Vec<u8>),
    Command(UiCommand),
    Ignore,
}

fn translate_key(key: &KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char(']') => KeyAction::Command(UiCommand::Disconnect),
            KeyCode::Char('e') => KeyAction::Command(UiCommand::ToggleEcho),
            // Ctrl-letter maps to the corresponding control byte.
            KeyCode::Char(c) if c.is_ascii_alphabetic() => {
                KeyAction::Bytes(vec![(c.to_ascii_uppercase() as u8) & 0x1f])
            }
            _ => KeyAction::Ignore,
        };
    }

    match key.code {
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            KeyAction::Bytes(c.encode_utf8(&mut buf).as_bytes().to_vec())
        }
        KeyCode::Enter => KeyAction::Bytes(b"\r".to_vec()),
        KeyCode::Tab => KeyAction::Bytes(b"\t".to_vec()),
        KeyCode::Backspace => KeyAction::Bytes(vec![0x7f]),
        KeyCode::Esc => KeyAction::Bytes(vec![0x1b]),
        KeyCode::Up => KeyAction::Bytes(b"\x1b[A".to_vec()),
        KeyCode::Down => KeyAction::Bytes(b"\x1b[B".to_vec()),
        KeyCode::Right => KeyAction::Bytes(b"\x1b[C".to_vec()),
        KeyCode::Left => KeyAction::Bytes(b"\x1b[D".to_vec()),
        KeyCode::Home => KeyAction::Bytes(b"\x1b[H".to_vec()),
        KeyCode::End => KeyAction::Bytes(b"\x1b[F".to_vec()),
        _ => KeyAction::Ignore,
    }
}

/// Enables raw mode for the lifetime of the guard.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> TermLinkResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}
