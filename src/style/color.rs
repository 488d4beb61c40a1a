/*!
 * Colour parsing and encoding.
 *
 * Colours arrive as names, `#RRGGBB[AA]` web hex, `0xRRGGBB` or ASS literals
 * (`&HBBGGRR`, `&HAABBGGRR`, optional trailing `&`). They are stored as RGB
 * plus an ASS alpha where `00` is opaque and `FF` fully transparent.
 */

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WEB_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{6})([0-9a-fA-F]{2})?$").unwrap());

static ASS_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^&[hH]([0-9a-fA-F]{6}|[0-9a-fA-F]{8})&?$").unwrap());

static ZERO_X_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0[xX]([0-9a-fA-F]{6})$").unwrap());

/// An RGB colour with ASS alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AssColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0 = opaque, 255 = transparent
    pub alpha: u8,
}

impl AssColor {
    pub const WHITE: AssColor = AssColor::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: AssColor = AssColor::rgb(0, 0, 0);
    pub const YELLOW: AssColor = AssColor::rgb(0xFF, 0xFF, 0);
    pub const TRANSPARENT: AssColor = AssColor::rgb(0, 0, 0).with_alpha(0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 0 }
    }

    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self { alpha, ..self }
    }

    /// Parse any supported colour notation
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(named) = Self::named(value) {
            return Some(named);
        }

        if let Some(caps) = ASS_HEX.captures(value) {
            let digits = caps.get(1)?.as_str();
            let (alpha, bgr) = if digits.len() == 8 {
                (hex_byte(&digits[0..2])?, &digits[2..])
            } else {
                (0, digits)
            };
            return Some(Self {
                b: hex_byte(&bgr[0..2])?,
                g: hex_byte(&bgr[2..4])?,
                r: hex_byte(&bgr[4..6])?,
                alpha,
            });
        }

        if let Some(caps) = ZERO_X_HEX.captures(value) {
            return Self::from_rgb_hex(caps.get(1)?.as_str());
        }

        let caps = WEB_HEX.captures(value)?;
        let color = Self::from_rgb_hex(caps.get(1)?.as_str())?;
        match caps.get(2) {
            // Web alpha is opacity, ASS alpha is transparency
            Some(a) => Some(color.with_alpha(255 - hex_byte(a.as_str())?)),
            None => Some(color),
        }
    }

    fn from_rgb_hex(digits: &str) -> Option<Self> {
        Some(Self::rgb(
            hex_byte(&digits[0..2])?,
            hex_byte(&digits[2..4])?,
            hex_byte(&digits[4..6])?,
        ))
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name.to_ascii_lowercase().as_str() {
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "yellow" => Self::YELLOW,
            "red" => Self::rgb(0xFF, 0, 0),
            "green" => Self::rgb(0, 0x80, 0),
            "lime" => Self::rgb(0, 0xFF, 0),
            "blue" => Self::rgb(0, 0, 0xFF),
            "cyan" => Self::rgb(0, 0xFF, 0xFF),
            "magenta" => Self::rgb(0xFF, 0, 0xFF),
            "orange" => Self::rgb(0xFF, 0xA5, 0),
            "purple" => Self::rgb(0x80, 0, 0x80),
            "pink" => Self::rgb(0xFF, 0xC0, 0xCB),
            "gray" | "grey" => Self::rgb(0x80, 0x80, 0x80),
            "skyblue" => Self::rgb(0x87, 0xCE, 0xEB),
            "navy" => Self::rgb(0, 0, 0x80),
            "transparent" | "none" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(color)
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha == 0xFF
    }

    /// `&HAABBGGRR` as used in ASS style lines
    pub fn to_ass(&self) -> String {
        format!("&H{:02X}{:02X}{:02X}{:02X}", self.alpha, self.b, self.g, self.r)
    }

    /// `#RRGGBB`
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// `0xRRGGBB[@opacity]` as accepted by ffmpeg filters
    pub fn to_ffmpeg(&self) -> String {
        let base = format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b);
        if self.alpha == 0 {
            base
        } else {
            format!("{}@{:.2}", base, self.opacity())
        }
    }

    /// Opacity in 0.0..=1.0
    pub fn opacity(&self) -> f64 {
        f64::from(255 - self.alpha) / 255.0
    }
}

fn hex_byte(digits: &str) -> Option<u8> {
    u8::from_str_radix(digits, 16).ok()
}

impl fmt::Display for AssColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ass())
    }
}

impl From<AssColor> for String {
    fn from(color: AssColor) -> Self {
        color.to_ass()
    }
}

impl TryFrom<String> for AssColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AssColor::parse(&value).ok_or_else(|| format!("invalid color '{}'", value))
    }
}
