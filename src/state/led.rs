//! Front LED state and its colour derivation.
//!
//! The device reports the colour either as an HSV triple (`"120;50;80"`) or
//! as an RGB hex string (`"FF0000"`) depending on its mode. The derived
//! hue/saturation/value is recomputed from whichever one is authoritative on
//! every mutation, so readers never see a stale cache.

use crate::device::models::LedStateDto;

/// Colour in HSV: hue in degrees (0..360), saturation and value in percent (0..=100).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Hsv {
    pub fn new(hue: f64, saturation: f64, value: f64) -> Self {
        Self {
            hue: hue.rem_euclid(360.0),
            saturation: saturation.clamp(0.0, 100.0),
            value: value.clamp(0.0, 100.0),
        }
    }

    /// Parse the device's `"hue;saturation;value"` notation.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(';').map(|p| p.trim().parse::<f64>());
        let hue = parts.next()?.ok()?;
        let saturation = parts.next()?.ok()?;
        let value = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(hue, saturation, value))
    }

    /// Convert an `"RRGGBB"` hex string (optional leading `#`).
    pub fn from_rgb_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::from_rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r = f64::from(r) / 255.0;
        let g = f64::from(g) / 255.0;
        let b = f64::from(b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        Self::new(hue, saturation * 100.0, max * 100.0)
    }

    /// Wire notation with integer components.
    pub fn to_wire(&self) -> String {
        format!(
            "{};{};{}",
            self.hue.round() as u16 % 360,
            self.saturation.round() as u8,
            self.value.round() as u8
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedMode {
    #[default]
    Hsv,
    Rgb,
}

impl LedMode {
    fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some(mode) if mode.eq_ignore_ascii_case("rgb") => Self::Rgb,
            _ => Self::Hsv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedState {
    pub on: bool,
    hsv: Option<String>,
    rgb: Option<String>,
    mode: LedMode,
    derived: Hsv,
}

impl LedState {
    pub fn new(on: bool, hsv: Option<String>, rgb: Option<String>, mode: LedMode) -> Self {
        let mut state = Self {
            on,
            hsv,
            rgb,
            mode,
            derived: Hsv::default(),
        };
        state.recompute();
        state
    }

    pub fn from_dto(dto: &LedStateDto) -> Self {
        Self::new(
            dto.on,
            dto.hsv.clone(),
            dto.rgb.clone(),
            LedMode::from_wire(dto.mode.as_deref()),
        )
    }

    pub fn mode(&self) -> LedMode {
        self.mode
    }

    pub fn color(&self) -> Hsv {
        self.derived
    }

    /// Locally predicted colour after a host write; the next poll overwrites it.
    pub fn predict_color(&mut self, color: Hsv) {
        self.mode = LedMode::Hsv;
        self.hsv = Some(color.to_wire());
        self.recompute();
    }

    fn recompute(&mut self) {
        let from_hsv = || self.hsv.as_deref().and_then(Hsv::parse);
        let from_rgb = || self.rgb.as_deref().and_then(Hsv::from_rgb_hex);
        let derived = match self.mode {
            LedMode::Hsv => from_hsv().or_else(from_rgb),
            LedMode::Rgb => from_rgb().or_else(from_hsv),
        };
        self.derived = derived.unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_mode_derivation() {
        let led = LedState::new(true, Some("120;50;80".into()), None, LedMode::Hsv);
        assert_eq!(led.color(), Hsv::new(120.0, 50.0, 80.0));
    }

    #[test]
    fn test_rgb_mode_derivation() {
        let led = LedState::new(true, Some("240;100;100".into()), Some("FF0000".into()), LedMode::Rgb);
        let color = led.color();
        assert!(color.hue.abs() < 0.5);
        assert!((color.saturation - 100.0).abs() < 0.5);
        assert!((color.value - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_rgb_conversions() {
        let green = Hsv::from_rgb_hex("#00FF00").unwrap();
        assert!((green.hue - 120.0).abs() < 0.5);

        let blue = Hsv::from_rgb(0, 0, 255);
        assert!((blue.hue - 240.0).abs() < 0.5);

        let grey = Hsv::from_rgb(128, 128, 128);
        assert_eq!(grey.saturation, 0.0);
        assert!((grey.value - 50.2).abs() < 0.1);
    }

    #[test]
    fn test_falls_back_when_authoritative_is_garbage() {
        let led = LedState::new(true, Some("garbage".into()), Some("00FF00".into()), LedMode::Hsv);
        assert!((led.color().hue - 120.0).abs() < 0.5);

        let led = LedState::new(true, None, None, LedMode::Rgb);
        assert_eq!(led.color(), Hsv::default());
    }

    #[test]
    fn test_predicted_color_switches_to_hsv() {
        let mut led = LedState::new(true, None, Some("FF0000".into()), LedMode::Rgb);
        led.predict_color(Hsv::new(200.0, 40.0, 60.0));
        assert_eq!(led.mode(), LedMode::Hsv);
        assert_eq!(led.color(), Hsv::new(200.0, 40.0, 60.0));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(Hsv::parse("1;2"), None);
        assert_eq!(Hsv::parse("1;2;3;4"), None);
        assert_eq!(Hsv::parse("a;b;c"), None);
        assert_eq!(Hsv::from_rgb_hex("FFF"), None);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(Hsv::new(359.6, 49.5, 80.2).to_wire(), "0;50;80");
    }
}
