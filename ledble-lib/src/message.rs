//! Command templates understood by the bulb firmware.
//!
//! Every command is a fixed-length frame. Some bytes are constant, the rest are
//! holes filled from the caller's parameters, left to right.

use std::fmt;

use crate::error::{Error, Result};

/// One byte position of a [`Template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Byte(u8),
    Hole,
}

use Slot::{Byte, Hole};

/// A fixed-length frame with positional holes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    slots: &'static [Slot],
    placeholders: usize,
}

impl Template {
    pub const fn new(slots: &'static [Slot]) -> Self {
        let mut placeholders = 0;
        let mut i = 0;
        while i < slots.len() {
            if let Hole = slots[i] {
                placeholders += 1;
            }
            i += 1;
        }
        Template {
            slots,
            placeholders,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of parameters needed to fill the template.
    pub fn placeholders(&self) -> usize {
        self.placeholders
    }

    pub fn slots(&self) -> &'static [Slot] {
        self.slots
    }
}

const TURN_ON: Template = Template::new(&[Byte(0xCC), Byte(0x23), Byte(0x33)]);
const TURN_OFF: Template = Template::new(&[Byte(0xCC), Byte(0x24), Byte(0x33)]);
// red, green, blue
const SET_COLOR: Template = Template::new(&[
    Byte(0x56),
    Hole,
    Hole,
    Hole,
    Byte(0x00),
    Byte(0xF0),
    Byte(0xAA),
]);
const SET_BRIGHTNESS: Template = Template::new(&[
    Byte(0x56),
    Byte(0x00),
    Byte(0x00),
    Byte(0x00),
    Hole,
    Byte(0x0F),
    Byte(0xAA),
]);
// effect code, speed
const SET_EFFECT: Template = Template::new(&[Byte(0xBB), Hole, Hole, Byte(0x44)]);

/// The kinds of commands a bulb accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    TurnOn,
    TurnOff,
    SetColor,
    SetBrightness,
    SetEffect,
}

impl Message {
    pub fn template(self) -> Template {
        match self {
            Message::TurnOn => TURN_ON,
            Message::TurnOff => TURN_OFF,
            Message::SetColor => SET_COLOR,
            Message::SetBrightness => SET_BRIGHTNESS,
            Message::SetEffect => SET_EFFECT,
        }
    }

    /// Builds the frame for this command.
    ///
    /// Parameters fill the holes in order. Surplus parameters are ignored;
    /// too few is an [`Error::EncodingArity`] and nothing is produced.
    pub fn encode(self, parameters: &[u8]) -> Result<Vec<u8>> {
        let template = self.template();
        if parameters.len() < template.placeholders() {
            return Err(Error::EncodingArity {
                kind: self,
                expected: template.placeholders(),
                supplied: parameters.len(),
            });
        }

        // Reversed so that popping from the tail walks the parameters front to back.
        let mut remaining: Vec<u8> = parameters.iter().rev().copied().collect();
        let mut frame = Vec::with_capacity(template.len());
        for slot in template.slots() {
            match slot {
                Byte(value) => frame.push(*value),
                Hole => match remaining.pop() {
                    Some(value) => frame.push(value),
                    None => {
                        return Err(Error::EncodingArity {
                            kind: self,
                            expected: template.placeholders(),
                            supplied: parameters.len(),
                        })
                    }
                },
            }
        }
        Ok(frame)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Message::TurnOn => "turn-on",
            Message::TurnOff => "turn-off",
            Message::SetColor => "set-color",
            Message::SetBrightness => "set-brightness",
            Message::SetEffect => "set-effect",
        };
        write!(f, "{}", name)
    }
}

/// Shorthand for [`Message::encode`].
pub fn encode(kind: Message, parameters: &[u8]) -> Result<Vec<u8>> {
    kind.encode(parameters)
}
