use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB { red, green, blue }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn from_hex(s: &str) -> Result<Self, ColorParseError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ColorParseError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError(s.to_string()))
        };
        Ok(RGB {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB::new(tuple.0, tuple.1, tuple.2)
    }
}

impl From<RGB> for (u8, u8, u8) {
    fn from(rgb: RGB) -> Self {
        (rgb.red, rgb.green, rgb.blue)
    }
}

impl fmt::Display for RGB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid color: {0}")]
pub struct ColorParseError(pub String);

/// Colors that can be picked by name on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NamedColor {
    Red,
    Green,
    Blue,
    White,
    WarmWhite,
    Yellow,
    Orange,
    Purple,
    Cyan,
    Magenta,
    Pink,
    Teal,
    Off,
}

impl NamedColor {
    pub fn rgb(self) -> RGB {
        let (red, green, blue) = match self {
            NamedColor::Red => (255, 0, 0),
            NamedColor::Green => (0, 255, 0),
            NamedColor::Blue => (0, 0, 255),
            NamedColor::White => (255, 255, 255),
            NamedColor::WarmWhite => (255, 180, 107),
            NamedColor::Yellow => (255, 255, 0),
            NamedColor::Orange => (255, 165, 0),
            NamedColor::Purple => (128, 0, 128),
            NamedColor::Cyan => (0, 255, 255),
            NamedColor::Magenta => (255, 0, 255),
            NamedColor::Pink => (255, 192, 203),
            NamedColor::Teal => (0, 128, 128),
            NamedColor::Off => (0, 0, 0),
        };
        RGB { red, green, blue }
    }
}

impl From<NamedColor> for RGB {
    fn from(color: NamedColor) -> Self {
        color.rgb()
    }
}

impl FromStr for NamedColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <NamedColor as ValueEnum>::from_str(s, true).map_err(|_| ColorParseError(s.to_string()))
    }
}
