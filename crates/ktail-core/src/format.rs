//! Line formats for decoded messages.

use std::io::{self, Write};

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::types::Message;

/// `text\n`
pub fn format_plain<W: Write + ?Sized>(w: &mut W, msg: &Message) -> io::Result<()> {
    writeln!(w, "{}", msg.text)
}

/// `[timestamp group] text\n`, or `[timestamp] text\n` without a group.
pub fn format_annotated<W: Write + ?Sized>(w: &mut W, msg: &Message) -> io::Result<()> {
    writeln!(w, "{} {}", prefix(msg), msg.text)
}

/// Same as [`format_annotated`] with the bracketed prefix in blue.
pub fn format_annotated_colored<W: Write + ?Sized>(w: &mut W, msg: &Message) -> io::Result<()> {
    writeln!(w, "{} {}", prefix(msg).blue(), msg.text)
}

fn prefix(msg: &Message) -> String {
    match &msg.log_group {
        Some(group) => format!("[{} {}]", msg.timestamp, group),
        None => format!("[{}]", msg.timestamp),
    }
}

/// Output style selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFormat {
    #[default]
    Plain,
    Annotated,
    AnnotatedColored,
}

impl LineFormat {
    pub fn write<W: Write + ?Sized>(self, w: &mut W, msg: &Message) -> io::Result<()> {
        match self {
            Self::Plain => format_plain(w, msg),
            Self::Annotated => format_annotated(w, msg),
            Self::AnnotatedColored => format_annotated_colored(w, msg),
        }
    }
}
