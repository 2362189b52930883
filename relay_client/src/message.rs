//! Text framing shared by the hub and its clients.
//!
//! Attributed messages travel as `"<id>:<payload>"` where `<id>` is a five
//! character [`PeerId`]. Anything else is an unattributed server line. The
//! delimiter sits at a fixed offset and is never escaped, so a payload whose
//! sixth character is `:` cannot be told apart from an attributed one; decoding
//! always prefers the attributed reading.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

/// Width of a peer id on the wire.
pub const ID_LEN: usize = 5;

const DELIMITER: char = ':';

/// Largest id handed out by [`PeerId::random`], exclusive.
const ID_SPACE: u32 = 99_999;

/// Identifier a client tags its outbound messages with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Id used by the hub for operator authored messages.
    pub fn system() -> Self {
        Self::from_number(0)
    }

    /// Picks a zero padded id in `[1, 99999)`.
    ///
    /// Ids are not coordinated between clients, two sessions may end up with the
    /// same one.
    pub fn random() -> Self {
        Self::from_number(rand::thread_rng().gen_range(1..ID_SPACE))
    }

    fn from_number(n: u32) -> Self {
        Self(format!("{:0width$}", n % 100_000, width = ID_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("peer id must be exactly 5 characters without ':', got {0:?}")]
pub struct InvalidPeerId(String);

impl FromStr for PeerId {
    type Err = InvalidPeerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() == ID_LEN && !s.contains(DELIMITER) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidPeerId(s.to_owned()))
        }
    }
}

/// Unit placed into a session's outbound slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

/// Result of [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<'a> {
    /// `None` for unattributed server lines.
    pub sender: Option<PeerId>,
    pub payload: &'a str,
}

pub fn encode(sender: &PeerId, payload: &str) -> String {
    format!("{sender}{DELIMITER}{payload}")
}

pub fn decode(text: &str) -> Decoded<'_> {
    match text.char_indices().nth(ID_LEN) {
        Some((at, DELIMITER)) => Decoded {
            sender: Some(PeerId(text[..at].to_owned())),
            payload: &text[at + DELIMITER.len_utf8()..],
        },
        _ => Decoded {
            sender: None,
            payload: text,
        },
    }
}
