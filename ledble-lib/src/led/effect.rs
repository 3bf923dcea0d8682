use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Built-in animations of the bulb firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    SevenColorCrossFade,
    RedGradualChange,
    GreenGradualChange,
    BlueGradualChange,
    YellowGradualChange,
    CyanGradualChange,
    PurpleGradualChange,
    WhiteGradualChange,
    RedGreenCrossFade,
    RedBlueCrossFade,
    GreenBlueCrossFade,
    SevenColorStrobeFlash,
    RedStrobeFlash,
    GreenStrobeFlash,
    BlueStrobeFlash,
    YellowStrobeFlash,
    CyanStrobeFlash,
    PurpleStrobeFlash,
    WhiteStrobeFlash,
    SevenColorJumpingChange,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid effect: {0}")]
pub struct EffectParseError(pub String);

impl Effect {
    /// Every effect, ordered by code.
    pub const ALL: [Effect; 20] = [
        Effect::SevenColorCrossFade,
        Effect::RedGradualChange,
        Effect::GreenGradualChange,
        Effect::BlueGradualChange,
        Effect::YellowGradualChange,
        Effect::CyanGradualChange,
        Effect::PurpleGradualChange,
        Effect::WhiteGradualChange,
        Effect::RedGreenCrossFade,
        Effect::RedBlueCrossFade,
        Effect::GreenBlueCrossFade,
        Effect::SevenColorStrobeFlash,
        Effect::RedStrobeFlash,
        Effect::GreenStrobeFlash,
        Effect::BlueStrobeFlash,
        Effect::YellowStrobeFlash,
        Effect::CyanStrobeFlash,
        Effect::PurpleStrobeFlash,
        Effect::WhiteStrobeFlash,
        Effect::SevenColorJumpingChange,
    ];

    /// The byte sent in the effect slot of a `SetEffect` frame.
    pub fn code(self) -> u8 {
        match self {
            Effect::SevenColorCrossFade => 0x25,
            Effect::RedGradualChange => 0x26,
            Effect::GreenGradualChange => 0x27,
            Effect::BlueGradualChange => 0x28,
            Effect::YellowGradualChange => 0x29,
            Effect::CyanGradualChange => 0x2A,
            Effect::PurpleGradualChange => 0x2B,
            Effect::WhiteGradualChange => 0x2C,
            Effect::RedGreenCrossFade => 0x2D,
            Effect::RedBlueCrossFade => 0x2E,
            Effect::GreenBlueCrossFade => 0x2F,
            Effect::SevenColorStrobeFlash => 0x30,
            Effect::RedStrobeFlash => 0x31,
            Effect::GreenStrobeFlash => 0x32,
            Effect::BlueStrobeFlash => 0x33,
            Effect::YellowStrobeFlash => 0x34,
            Effect::CyanStrobeFlash => 0x35,
            Effect::PurpleStrobeFlash => 0x36,
            Effect::WhiteStrobeFlash => 0x37,
            Effect::SevenColorJumpingChange => 0x38,
        }
    }

    pub fn from_code(code: u8) -> Option<Effect> {
        Effect::ALL.into_iter().find(|effect| effect.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Effect::SevenColorCrossFade => "seven-color-cross-fade",
            Effect::RedGradualChange => "red-gradual-change",
            Effect::GreenGradualChange => "green-gradual-change",
            Effect::BlueGradualChange => "blue-gradual-change",
            Effect::YellowGradualChange => "yellow-gradual-change",
            Effect::CyanGradualChange => "cyan-gradual-change",
            Effect::PurpleGradualChange => "purple-gradual-change",
            Effect::WhiteGradualChange => "white-gradual-change",
            Effect::RedGreenCrossFade => "red-green-cross-fade",
            Effect::RedBlueCrossFade => "red-blue-cross-fade",
            Effect::GreenBlueCrossFade => "green-blue-cross-fade",
            Effect::SevenColorStrobeFlash => "seven-color-strobe-flash",
            Effect::RedStrobeFlash => "red-strobe-flash",
            Effect::GreenStrobeFlash => "green-strobe-flash",
            Effect::BlueStrobeFlash => "blue-strobe-flash",
            Effect::YellowStrobeFlash => "yellow-strobe-flash",
            Effect::CyanStrobeFlash => "cyan-strobe-flash",
            Effect::PurpleStrobeFlash => "purple-strobe-flash",
            Effect::WhiteStrobeFlash => "white-strobe-flash",
            Effect::SevenColorJumpingChange => "seven-color-jumping-change",
        }
    }
}

impl From<Effect> for u8 {
    fn from(effect: Effect) -> Self {
        effect.code()
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Effect {
    type Err = EffectParseError;

    /// Accepts either the kebab-case name or the effect code (`0x25` or `37`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Some(effect) = Effect::ALL
            .into_iter()
            .find(|effect| effect.name() == s.replace('_', "-"))
        {
            return Ok(effect);
        }
        let code = match s.strip_prefix("0x") {
            Some(hex) => u8::from_str_radix(hex, 16).ok(),
            None => s.parse::<u8>().ok(),
        };
        code.and_then(Effect::from_code).ok_or(EffectParseError(s))
    }
}
