// src/keys.rs

//! Input tokens and raw keyboard decoding.
//!
//! The console delivers raw bytes; [`KeyDecoder`] turns them into key names
//! such as `"up"`, `"q"` or `"ctrl-c"`, and [`Token::parse`] maps a key name to
//! the closed set of bench commands.

use std::fmt;

/// Every key the bench reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Up,
    Down,
    Left,
    Right,
    /// `1`..`4`.
    Edge(u8),
    Ramp,
    Knife,
    Pyramid,
    Flat,
    CycleStep,
    CycleWidth,
    IntensityDown,
    IntensityUp,
    ToggleCorrection,
    Lock,
    Unlock,
    RetryLock,
    PrintOffset,
    Menu,
    Quit,
}

impl Token {
    /// Looks up a key name. Returns `None` for anything outside the command set.
    pub fn parse(key: &str) -> Option<Token> {
        let token = match key {
            "up" => Token::Up,
            "down" => Token::Down,
            "left" => Token::Left,
            "right" => Token::Right,
            "1" => Token::Edge(1),
            "2" => Token::Edge(2),
            "3" => Token::Edge(3),
            "4" => Token::Edge(4),
            "e" => Token::Ramp,
            "k" => Token::Knife,
            "p" => Token::Pyramid,
            "f" => Token::Flat,
            "s" => Token::CycleStep,
            "w" => Token::CycleWidth,
            "[" => Token::IntensityDown,
            "]" => Token::IntensityUp,
            "g" => Token::ToggleCorrection,
            "l" => Token::Lock,
            "u" => Token::Unlock,
            "r" => Token::RetryLock,
            "o" => Token::PrintOffset,
            "m" => Token::Menu,
            "q" | "ctrl-c" => Token::Quit,
            _ => return None,
        };
        Some(token)
    }

    /// The key name shown in the menu.
    pub fn key(self) -> &'static str {
        match self {
            Token::Up => "up",
            Token::Down => "down",
            Token::Left => "left",
            Token::Right => "right",
            Token::Edge(1) => "1",
            Token::Edge(2) => "2",
            Token::Edge(3) => "3",
            Token::Edge(_) => "4",
            Token::Ramp => "e",
            Token::Knife => "k",
            Token::Pyramid => "p",
            Token::Flat => "f",
            Token::CycleStep => "s",
            Token::CycleWidth => "w",
            Token::IntensityDown => "[",
            Token::IntensityUp => "]",
            Token::ToggleCorrection => "g",
            Token::Lock => "l",
            Token::Unlock => "u",
            Token::RetryLock => "r",
            Token::PrintOffset => "o",
            Token::Menu => "m",
            Token::Quit => "q",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const ESC: u8 = 0x1b;
const CTRL_C: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Ground,
    Escape,
    Csi,
}

/// Splits raw terminal input into key names.
///
/// Escape sequences may be split across reads, so the decoder carries its
/// state between calls to [`KeyDecoder::feed`].
#[derive(Debug)]
pub struct KeyDecoder {
    state: DecodeState,
    csi: Vec<u8>,
}

impl Default for KeyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDecoder {
    pub fn new() -> Self {
        KeyDecoder {
            state: DecodeState::Ground,
            csi: Vec::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut keys = Vec::new();
        for &byte in bytes {
            match self.state {
                DecodeState::Ground => match byte {
                    ESC => self.state = DecodeState::Escape,
                    CTRL_C => keys.push("ctrl-c".to_string()),
                    b'\r' | b'\n' | b'\t' | b' ' => {}
                    0x21..=0x7e => keys.push(char::from(byte).to_string()),
                    other => {
                        log::debug!("Ignoring input byte 0x{:02x}", other);
                    }
                },
                DecodeState::Escape => {
                    if byte == b'[' || byte == b'O' {
                        self.csi.clear();
                        self.state = DecodeState::Csi;
                    } else {
                        // Bare ESC followed by an ordinary key.
                        self.state = DecodeState::Ground;
                        keys.extend(self.feed(&[byte]));
                    }
                }
                DecodeState::Csi => {
                    if (0x40..=0x7e).contains(&byte) {
                        self.state = DecodeState::Ground;
                        if let Some(name) = self.finish_sequence(byte) {
                            keys.push(name);
                        }
                    } else {
                        self.csi.push(byte);
                    }
                }
            }
        }
        keys
    }

    fn finish_sequence(&mut self, final_byte: u8) -> Option<String> {
        let name = match (self.csi.is_empty(), final_byte) {
            (true, b'A') => "up".to_string(),
            (true, b'B') => "down".to_string(),
            (true, b'C') => "right".to_string(),
            (true, b'D') => "left".to_string(),
            _ => {
                log::debug!(
                    "Ignoring escape sequence {:?} {}",
                    String::from_utf8_lossy(&self.csi),
                    char::from(final_byte)
                );
                return None;
            }
        };
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn it_should_parse_every_menu_key() {
        for key in [
            "up", "down", "left", "right", "1", "2", "3", "4", "e", "k", "p", "f", "s", "w",
            "[", "]", "g", "l", "u", "r", "o", "m", "q",
        ] {
            let token = Token::parse(key).unwrap_or_else(|| panic!("{} not parsed", key));
            assert_eq!(token.key(), key);
        }
        assert_eq!(Token::parse("ctrl-c"), Some(Token::Quit));
    }

    #[test]
    fn it_should_reject_unknown_keys() {
        for key in ["x", "5", "0", "", "upp", "Q", "ctrl-d"] {
            assert_eq!(Token::parse(key), None, "{:?}", key);
        }
    }

    #[test]
    fn it_should_decode_arrow_keys() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(
            decoder.feed(b"\x1b[A\x1b[B\x1b[C\x1b[D"),
            vec!["up", "down", "right", "left"]
        );
        // Application cursor mode.
        assert_eq!(decoder.feed(b"\x1bOA"), vec!["up"]);
    }

    #[test]
    fn it_should_join_sequences_split_across_reads() {
        let mut decoder = KeyDecoder::new();
        assert!(decoder.feed(b"\x1b").is_empty());
        assert!(decoder.feed(b"[").is_empty());
        assert_eq!(decoder.feed(b"Cq"), vec!["right", "q"]);
    }

    #[test]
    fn it_should_decode_plain_keys_and_ctrl_c() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"l\r\n3\x03"), vec!["l", "3", "ctrl-c"]);
    }

    #[test]
    fn it_should_drop_unknown_escape_sequences() {
        let mut decoder = KeyDecoder::new();
        assert_eq!(decoder.feed(b"\x1b[3~u"), vec!["u"]);
        assert_eq!(decoder.feed(b"\x1b[1;5Cm"), vec!["m"]);
    }
}
