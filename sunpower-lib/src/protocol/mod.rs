mod value;

use std::fmt::Display;
use std::ops::Deref;

pub use value::{parse_single_value, ParsedValue, NO_REPLY};

/// Terminator appended to every outgoing command.
pub const TERMINATOR: char = '\r';

/// Upper bound for a single reply read.
pub const READ_SIZE: usize = 1024;

/// Command vocabulary, sent verbatim.
pub mod cmds {
    pub const STATUS: &str = "STATUS";
    pub const ERROR: &str = "ERROR";
    pub const VERSION: &str = "VERSION";
    pub const COLD_HEAD_TEMP: &str = "TC";
    pub const REJECT_TEMP: &str = "TEMP RJ";
    pub const TARGET_TEMP: &str = "TTARGET";
    pub const MEASURED_POWER: &str = "P";
    pub const COMMANDED_POWER: &str = "PWOUT";
    pub const CURRENT_COMMANDED_POWER: &str = "E";
    pub const COOLER_ON: &str = "COOLER=ON";
    pub const COOLER_OFF: &str = "COOLER=OFF";
}

/// Builds a `NAME=value` setter command.
///
/// Floats are rendered with a decimal point even when integral, so
/// `assign("TTARGET", 120.0)` yields `TTARGET=120.0`.
pub fn assign<T: Into<f64>>(command: &str, value: T) -> String {
    format!("{}={:?}", command, value.into())
}

/// Encodes a command for the wire.
pub fn frame(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(TERMINATOR as u8);
    bytes
}

/// Trimmed, non-empty lines received in one read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply(Vec<String>);

impl Reply {
    /// Decodes raw bytes, substituting U+FFFD for invalid sequences, and
    /// splits them on `\n`, `\r\n` and bare `\r`.
    pub fn from_bytes(raw: &[u8]) -> Self {
        String::from_utf8_lossy(raw)
            .split(&['\n', '\r'][..])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Whitespace-delimited tokens of all lines, in order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|line| line.split_whitespace())
    }

    pub fn into_lines(self) -> Vec<String> {
        self.0
    }
}

impl Deref for Reply {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Reply {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Reply(iter.into_iter().map(Into::into).collect())
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.join("\n").fmt(f)
    }
}
