//! Line-oriented text protocol shared by the controller and the worker.
//!
//! A command is one line of whitespace-separated tokens ending in `\n`. The
//! first token is the verb (`WRITE`, `READ`, `HELP`), matched case-insensitively
//! by the worker and always sent in uppercase by the controller.
//!
//! Replies are plain text with no length prefix and no status marker; multi-line
//! replies use `\n` internally. [`Reply`] keeps the success/error distinction on
//! the worker side only, because the wire cannot carry it.

use std::fmt;

/// Upper bound on the bytes the controller reads for one reply.
pub const REPLY_BUFFER_SIZE: usize = 4096;

/// Longest command line the worker accepts, newline excluded.
pub const MAX_COMMAND_BYTES: usize = 4096;

/// A structured command, before encoding or after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Store a new record. All fields are joined with single spaces into one
    /// name, so field boundaries do not survive the trip.
    Write { fields: Vec<String> },
    /// Query the store. The worker understands `count` and `all`; other keys
    /// decode fine and are answered with an error reply.
    Read { key: String },
    Help,
}

impl Operation {
    /// Encodes the operation as a single protocol line, including the trailing
    /// newline.
    pub fn encode(&self) -> String {
        match self {
            Operation::Write { fields } if fields.is_empty() => "WRITE\n".to_string(),
            Operation::Write { fields } => format!("WRITE {}\n", fields.join(" ")),
            Operation::Read { key } => format!("READ {key}\n"),
            Operation::Help => "HELP\n".to_string(),
        }
    }

    /// Decodes one received line.
    ///
    /// Inputs the worker cannot act on come back as a [`Rejection`], which
    /// still has a reply to send. Decoding never touches the store.
    pub fn decode(line: &str) -> Result<Self, Rejection> {
        let mut tokens = line.split_whitespace();
        let Some(verb) = tokens.next() else {
            return Err(Rejection::Empty);
        };

        match verb.to_lowercase().as_str() {
            "read" => match tokens.next() {
                Some(key) => Ok(Operation::Read {
                    key: key.to_lowercase(),
                }),
                None => Err(Rejection::MissingReadKey),
            },
            "write" => Ok(Operation::Write {
                fields: tokens.map(str::to_string).collect(),
            }),
            "help" => Ok(Operation::Help),
            other => Err(Rejection::UnknownVerb(other.to_string())),
        }
    }
}

/// A command line the worker could not turn into an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    MissingReadKey,
    UnknownVerb(String),
    /// The line ran past [`MAX_COMMAND_BYTES`]; the worker skips the rest of it.
    TooLong,
}

impl Rejection {
    pub fn reply(&self) -> Reply {
        let text = match self {
            Rejection::Empty => "Empty command.",
            Rejection::MissingReadKey => "Usage: read count | read all",
            Rejection::UnknownVerb(_) => "Unknown command. Use 'help' to see the options.",
            Rejection::TooLong => "Command too long.",
        };
        Reply::Error(text.to_string())
    }
}

/// Outcome of one command. Both variants encode to the same bare text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Error(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Ok(text) | Reply::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn encode(&self) -> Vec<u8> {
        self.text().as_bytes().to_vec()
    }

    /// Reads a reply as the controller sees it: whatever one read returned,
    /// decoded lossily and trimmed.
    pub fn decode(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).trim().to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
