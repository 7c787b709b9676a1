//! Color strings: parsing `#rrggbb`, `rgb()`, and `hsl()` forms and the
//! derived forms templates can ask for.
//!
//! ```text
//! {{ primary.bg.nohash }}    458588
//! {{ primary.bg | alt }}     #386c6e
//! ```
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Derived forms reachable as a trailing path segment or a filter.
pub const PROPERTIES: [&str; 6] = ["hex", "nohash", "alt", "maxsat", "rgb", "hsv"];

/// A string that is not a color.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid color \"{0}\"")]
pub struct ColorError(pub String);

/// An opaque sRGB color. Alpha components are accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
}

/// Whether `name` is one of [`PROPERTIES`].
#[must_use]
pub fn is_property(name: &str) -> bool {
    PROPERTIES.contains(&name)
}

/// Float to channel; `as` saturates at both ends.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn to_byte(value: f64) -> u8 {
    value as u8
}

fn unit(byte: u8) -> f64 {
    f64::from(byte) / 255.0
}

#[allow(clippy::many_single_char_names)]
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let sector = (h * 6.0).floor();
    let f = h.mul_add(6.0, -sector);
    let p = v * (1.0 - s);
    let q = v * s.mul_add(-f, 1.0);
    let t = v * s.mul_add(-(1.0 - f), 1.0);
    match sector.rem_euclid(6.0) {
        x if x < 1.0 => (v, t, p),
        x if x < 2.0 => (q, v, p),
        x if x < 3.0 => (p, v, t),
        x if x < 4.0 => (p, q, v),
        x if x < 5.0 => (t, p, v),
        _ => (v, p, q),
    }
}

#[allow(clippy::many_single_char_names, clippy::similar_names)]
fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l.mul_add(-s, l + s) };
    let m1 = 2.0f64.mul_add(l, -m2);
    let channel = |hue: f64| {
        let hue = hue.rem_euclid(1.0);
        if hue < 1.0 / 6.0 {
            ((m2 - m1) * hue).mul_add(6.0, m1)
        } else if hue < 0.5 {
            m2
        } else if hue < 2.0 / 3.0 {
            ((m2 - m1) * (2.0 / 3.0 - hue)).mul_add(6.0, m1)
        } else {
            m1
        }
    };
    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

/// Parse one numeric component, scaling a trailing `%` against `full`.
fn component(text: &str, full: f64) -> Option<f64> {
    let text = text.trim();
    let number = match text.strip_suffix('%') {
        Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0 * full),
        None => text.parse::<f64>().ok(),
    };
    number.filter(|n| n.is_finite())
}

/// Split `name(a, b, c)` or `name(a, b, c, alpha)` into its three leading
/// components.
fn function_args<'a>(text: &'a str, names: &[&str]) -> Option<[&'a str; 3]> {
    let (name, rest) = text.split_once('(')?;
    if !names.contains(&name.trim()) {
        return None;
    }
    let inner = rest.strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').collect();
    match parts.as_slice() {
        [a, b, c] | [a, b, c, _] => Some([*a, *b, *c]),
        _ => None,
    }
}

impl Color {
    /// Build a color from its channels.
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb`, `#rrggbb` (with optional alpha digits), `rgb(r, g, b)`,
    /// or `hsl(h, s%, l%)`, with optional `a` suffixed function names.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError`] if `text` is none of these forms.
    #[allow(clippy::many_single_char_names)]
    pub fn parse(text: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError(text.to_string());
        let lower = text.trim().to_ascii_lowercase();
        if let Some(digits) = lower.strip_prefix('#') {
            return Self::parse_hex(digits).ok_or_else(invalid);
        }
        if let Some([r, g, b]) = function_args(&lower, &["rgb", "rgba"]) {
            let channel = |c: &str| {
                component(c, 255.0)
                    .filter(|n| (0.0..=255.0).contains(n))
                    .map(|n| to_byte(n.round()))
            };
            return match (channel(r), channel(g), channel(b)) {
                (Some(r), Some(g), Some(b)) => Ok(Self { r, g, b }),
                _ => Err(invalid()),
            };
        }
        if let Some([h, s, l]) = function_args(&lower, &["hsl", "hsla"]) {
            let hue = h.trim();
            let hue = component(hue.strip_suffix("deg").unwrap_or(hue), 360.0);
            let percent = |c: &str| {
                c.trim()
                    .ends_with('%')
                    .then(|| component(c, 1.0))
                    .flatten()
                    .filter(|n| (0.0..=1.0).contains(n))
            };
            return match (hue, percent(s), percent(l)) {
                (Some(h), Some(s), Some(l)) => {
                    let (r, g, b) = hsl_to_rgb(h / 360.0, s, l);
                    Ok(Self::from_units(r, g, b, f64::round))
                }
                _ => Err(invalid()),
            };
        }
        Err(invalid())
    }

    fn parse_hex(digits: &str) -> Option<Self> {
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let pair = |at: usize| {
            digits
                .get(at..at + 2)
                .and_then(|p| u8::from_str_radix(p, 16).ok())
        };
        let single = |at: usize| {
            digits
                .get(at..=at)
                .and_then(|p| u8::from_str_radix(p, 16).ok())
                .map(|n| n * 17)
        };
        let (r, g, b) = match digits.len() {
            3 | 4 => (single(0)?, single(1)?, single(2)?),
            6 | 8 => (pair(0)?, pair(2)?, pair(4)?),
            _ => return None,
        };
        Some(Self { r, g, b })
    }

    fn from_units(r: f64, g: f64, b: f64, round: fn(f64) -> f64) -> Self {
        Self {
            r: to_byte(round(r * 255.0)),
            g: to_byte(round(g * 255.0)),
            b: to_byte(round(b * 255.0)),
        }
    }

    /// Hue in `0.0..1.0`, saturation, and value, as HSV.
    #[must_use]
    #[allow(clippy::similar_names)]
    pub fn to_hsv(self) -> (f64, f64, f64) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let v = unit(max);
        if max == min {
            return (0.0, 0.0, v);
        }
        let range = unit(max) - unit(min);
        let s = range / v;
        let rc = (v - unit(self.r)) / range;
        let gc = (v - unit(self.g)) / range;
        let bc = (v - unit(self.b)) / range;
        let h = if self.r == max {
            bc - gc
        } else if self.g == max {
            2.0 + rc - bc
        } else {
            4.0 + gc - rc
        };
        ((h / 6.0).rem_euclid(1.0), s, v)
    }

    /// `#rrggbb`, lowercase.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// The hex form without its leading `#`.
    #[must_use]
    pub fn nohash(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// `rgb(r, g, b)`.
    #[must_use]
    pub fn rgb(self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// A slightly darker variant of a light color, or a slightly lighter
    /// variant of a dark one.
    #[must_use]
    #[allow(clippy::many_single_char_names)]
    pub fn alt(self) -> Self {
        let (h, s, v) = self.to_hsv();
        let v = if v > 0.5 { v - 0.1 } else { v + 0.1 };
        let (r, g, b) = hsv_to_rgb(h, s, v);
        Self::from_units(r, g, b, f64::trunc)
    }

    /// The same hue at full saturation and half lightness.
    #[must_use]
    pub fn maxsat(self) -> Self {
        let (h, _, _) = self.to_hsv();
        let degrees = (h * 360.0).trunc();
        let (r, g, b) = hsl_to_rgb(degrees / 360.0, 1.0, 0.5);
        Self::from_units(r, g, b, f64::round)
    }

    /// The derived form called `name`, if it is one of [`PROPERTIES`].
    ///
    /// `hsv` is `[degrees, saturation, value]`; `alt` and `maxsat` are hex
    /// strings.
    #[must_use]
    pub fn property(self, name: &str) -> Option<Value> {
        let value = match name {
            "hex" => Value::String(self.hex()),
            "nohash" => Value::String(self.nohash()),
            "rgb" => Value::String(self.rgb()),
            "alt" => Value::String(self.alt().hex()),
            "maxsat" => Value::String(self.maxsat().hex()),
            "hsv" => {
                let (h, s, v) = self.to_hsv();
                serde_json::json!([(h * 360.0).trunc(), s, v])
            }
            _ => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl std::str::FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Color::parse("#458588"), Ok(Color::from_rgb(0x45, 0x85, 0x88)));
        assert_eq!(Color::parse("#FFF"), Ok(Color::from_rgb(255, 255, 255)));
        assert_eq!(Color::parse(" #45858880 "), Ok(Color::from_rgb(0x45, 0x85, 0x88)));
    }

    #[test]
    fn parses_function_forms() {
        assert_eq!(
            Color::parse("rgb(69, 133, 136)"),
            Ok(Color::from_rgb(69, 133, 136))
        );
        assert_eq!(
            Color::parse("rgba(0, 0, 255, 0.5)"),
            Ok(Color::from_rgb(0, 0, 255))
        );
        assert_eq!(Color::parse("hsl(0, 100%, 50%)"), Ok(Color::from_rgb(255, 0, 0)));
        assert_eq!(
            Color::parse("hsl(120deg, 100%, 25%)"),
            Ok(Color::from_rgb(0, 128, 0))
        );
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["#12", "#ggg", "458588", "rgb(1, 2)", "rgb(300, 0, 0)", "hsl(0, 1, 1)", "red", ""] {
            assert!(Color::parse(bad).is_err(), "{bad} should be rejected");
        }
        insta::assert_snapshot!(Color::parse("#12").unwrap_err().to_string(), @r##"invalid color "#12""##);
    }

    #[test]
    fn string_forms() {
        let color = Color::parse("#458588").unwrap();
        assert_eq!(color.hex(), "#458588");
        assert_eq!(color.nohash(), "458588");
        assert_eq!(color.rgb(), "rgb(69, 133, 136)");
        assert_eq!(color.to_string(), "#458588");
    }

    #[test]
    fn alt_moves_value_toward_the_middle() {
        assert_eq!(Color::from_rgb(255, 255, 255).alt().hex(), "#e5e5e5");
        assert_eq!(Color::from_rgb(0, 0, 0).alt().hex(), "#191919");
    }

    #[test]
    fn maxsat_keeps_hue() {
        assert_eq!(Color::parse("#804040").unwrap().maxsat().hex(), "#ff0000");
        assert_eq!(Color::parse("#408080").unwrap().maxsat().hex(), "#00ffff");
    }

    #[test]
    fn hsv_property() {
        let hsv = Color::from_rgb(255, 0, 0).property("hsv").unwrap();
        assert_eq!(hsv, json!([0.0, 1.0, 1.0]));
        let hsv = Color::from_rgb(0, 0, 255).property("hsv").unwrap();
        assert_eq!(hsv[0], json!(240.0));
        assert_eq!(Color::from_rgb(0, 0, 0).property("bogus"), None);
    }
}
