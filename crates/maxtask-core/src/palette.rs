use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Display colors shared by projects and tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Green,
    Purple,
    Red,
    Yellow,
    Pink,
    Indigo,
    Orange,
    #[default]
    Gray,
}

impl Color {
    pub const ALL: [Color; 9] = [
        Color::Blue,
        Color::Green,
        Color::Purple,
        Color::Red,
        Color::Yellow,
        Color::Pink,
        Color::Indigo,
        Color::Orange,
        Color::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Color::Blue => "blue",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Red => "red",
            Color::Yellow => "yellow",
            Color::Pink => "pink",
            Color::Indigo => "indigo",
            Color::Orange => "orange",
            Color::Gray => "gray",
        }
    }

    /// Presentation token used by the web front end (`bg-blue-500`).
    pub fn token(self) -> String {
        format!("bg-{}-500", self.name())
    }

    /// SGR code for terminal output. Indigo and orange have no basic ANSI
    /// counterpart, so they use 256-color codes.
    pub fn ansi(self) -> &'static str {
        match self {
            Color::Blue => "34",
            Color::Green => "32",
            Color::Purple => "35",
            Color::Red => "31",
            Color::Yellow => "33",
            Color::Pink => "95",
            Color::Indigo => "38;5;63",
            Color::Orange => "38;5;208",
            Color::Gray => "90",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let name = raw
            .strip_prefix("bg-")
            .and_then(|rest| rest.strip_suffix("-500"))
            .unwrap_or(&raw);
        let name = if name == "grey" { "gray" } else { name };

        Color::ALL
            .iter()
            .copied()
            .find(|color| color.name() == name)
            .ok_or_else(|| anyhow!("unknown color: {s}"))
    }
}
