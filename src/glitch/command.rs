//! Glitcher command set
//!
//! Every command is one ASCII line: a single-letter opcode, optionally
//! followed by a space and a decimal argument.

use std::fmt;

/// Byte the glitcher sends when a glitch attempt has finished
pub const COMPLETION_MARKER: u8 = b'x';

/// Commands understood by the glitcher firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the delay before the pulse fires
    Delay(i64),
    /// Set the pulse width
    Pulse(i64),
    /// Fire a glitch with the staged delay and pulse
    Glitch,
    /// Startup handshake
    Hello,
    /// Ask the device to check the target (not used by the sweep)
    #[allow(dead_code)]
    Check,
    /// Device power-cycles the target after each glitch
    PowerCyclingEnable,
    /// Host waits for [`COMPLETION_MARKER`] instead
    PowerCyclingDisable,
}

impl Command {
    pub fn opcode(&self) -> char {
        match self {
            Command::Delay(_) => 'd',
            Command::Pulse(_) => 'p',
            Command::Glitch => 'g',
            Command::Hello => 'h',
            Command::Check => 'c',
            Command::PowerCyclingEnable => 'e',
            Command::PowerCyclingDisable => 'f',
        }
    }

    pub fn argument(&self) -> Option<i64> {
        match self {
            Command::Delay(v) | Command::Pulse(v) => Some(*v),
            _ => None,
        }
    }

    /// Wire form, newline terminated
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(arg) => write!(f, "{} {}", self.opcode(), arg),
            None => write!(f, "{}", self.opcode()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_with_argument() {
        assert_eq!(Command::Delay(42).encode(), b"d 42\n");
        assert_eq!(Command::Pulse(7).encode(), b"p 7\n");
    }

    #[test]
    fn test_encode_bare_opcodes() {
        let expected: [(Command, &[u8]); 5] = [
            (Command::Glitch, b"g\n"),
            (Command::Hello, b"h\n"),
            (Command::Check, b"c\n"),
            (Command::PowerCyclingEnable, b"e\n"),
            (Command::PowerCyclingDisable, b"f\n"),
        ];
        for (command, wire) in expected {
            assert_eq!(command.encode(), wire);
            assert_eq!(command.argument(), None);
        }
    }
}
