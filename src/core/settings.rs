// Per-run settings: parsed from the request JSON, clamped to their ranges

use image::Rgb;
use serde::Deserialize;
use std::ops::RangeInclusive;
use tracing::debug;

use crate::core::errors::{SettingsError, SettingsResult};

pub const THRESHOLD_RANGE: RangeInclusive<u32> = 1..=255;
pub const MIN_AREA_RANGE: RangeInclusive<u32> = 1..=200;
pub const DILATION_ITER_RANGE: RangeInclusive<u32> = 0..=10;
pub const CIRCLE_THICKNESS_RANGE: RangeInclusive<u32> = 1..=10;
pub const OVERLAY_OPACITY_RANGE: RangeInclusive<u32> = 0..=255;
pub const TOUCH_DISTANCE_RANGE: RangeInclusive<u32> = 1..=50;
pub const IMAGE_SPACING_RANGE: RangeInclusive<u32> = 0..=100;
pub const SEPARATOR_THICKNESS_RANGE: RangeInclusive<u32> = 1..=10;

/// Immutable configuration for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub threshold: u8,
    pub min_area: u32,
    pub dilation_iter: u32,
    pub circle_thickness: u32,
    pub circle_color: Rgb<u8>,
    pub overlay_color: Rgb<u8>,
    pub overlay_opacity: u8,
    pub touch_distance: u32,
    pub image_spacing: u32,
    pub separator_color: Rgb<u8>,
    pub separator_thickness: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: 30,
            min_area: 40,
            dilation_iter: 2,
            circle_thickness: 2,
            circle_color: Rgb([255, 0, 0]),
            overlay_color: Rgb([255, 0, 0]),
            overlay_opacity: 100,
            touch_distance: 10,
            image_spacing: 10,
            separator_color: Rgb([0x87, 0xCE, 0xEB]),
            separator_thickness: 2,
        }
    }
}

impl Settings {
    /// Parse the JSON settings object sent by the web client
    pub fn from_json(json: &str) -> SettingsResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let request: SettingsRequest = serde_json::from_str(json)?;
        request.resolve()
    }

    /// Copy with every numeric field pulled into its range.
    ///
    /// The pipeline applies this to every run, so settings built by hand
    /// obey the same bounds as parsed ones.
    pub fn clamped(self) -> Self {
        Self {
            threshold: clamp_value("threshold", self.threshold as u32, THRESHOLD_RANGE) as u8,
            min_area: clamp_value("minArea", self.min_area, MIN_AREA_RANGE),
            dilation_iter: clamp_value("dilationIter", self.dilation_iter, DILATION_ITER_RANGE),
            circle_thickness: clamp_value("circleThickness", self.circle_thickness, CIRCLE_THICKNESS_RANGE),
            touch_distance: clamp_value("touchDistance", self.touch_distance, TOUCH_DISTANCE_RANGE),
            image_spacing: clamp_value("imageSpacing", self.image_spacing, IMAGE_SPACING_RANGE),
            separator_thickness: clamp_value(
                "separatorThickness",
                self.separator_thickness,
                SEPARATOR_THICKNESS_RANGE,
            ),
            ..self
        }
    }
}

fn clamp_value(name: &str, value: u32, range: RangeInclusive<u32>) -> u32 {
    let clamped = value.clamp(*range.start(), *range.end());
    if clamped != value {
        debug!("Setting {} = {} adjusted to {}", name, value, clamped);
    }
    clamped
}

/// Raw settings as received; every field optional, numbers unchecked
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsRequest {
    pub threshold: Option<f64>,
    pub min_area: Option<f64>,
    pub dilation_iter: Option<f64>,
    pub circle_thickness: Option<f64>,
    pub circle_color: Option<String>,
    pub overlay_color: Option<String>,
    pub overlay_opacity: Option<f64>,
    pub touch_distance: Option<f64>,
    pub image_spacing: Option<f64>,
    pub separator_color: Option<String>,
    pub separator_thickness: Option<f64>,
}

impl SettingsRequest {
    /// Fill defaults and clamp every numeric field into its range.
    ///
    /// Only malformed colors are rejected; out-of-range numbers never are.
    pub fn resolve(&self) -> SettingsResult<Settings> {
        let d = Settings::default();
        Ok(Settings {
            threshold: clamp_field("threshold", self.threshold, d.threshold as u32, THRESHOLD_RANGE) as u8,
            min_area: clamp_field("minArea", self.min_area, d.min_area, MIN_AREA_RANGE),
            dilation_iter: clamp_field("dilationIter", self.dilation_iter, d.dilation_iter, DILATION_ITER_RANGE),
            circle_thickness: clamp_field(
                "circleThickness",
                self.circle_thickness,
                d.circle_thickness,
                CIRCLE_THICKNESS_RANGE,
            ),
            circle_color: color_field("circleColor", self.circle_color.as_deref(), d.circle_color)?,
            overlay_color: color_field("overlayColor", self.overlay_color.as_deref(), d.overlay_color)?,
            overlay_opacity: clamp_field(
                "overlayOpacity",
                self.overlay_opacity,
                d.overlay_opacity as u32,
                OVERLAY_OPACITY_RANGE,
            ) as u8,
            touch_distance: clamp_field("touchDistance", self.touch_distance, d.touch_distance, TOUCH_DISTANCE_RANGE),
            image_spacing: clamp_field("imageSpacing", self.image_spacing, d.image_spacing, IMAGE_SPACING_RANGE),
            separator_color: color_field("separatorColor", self.separator_color.as_deref(), d.separator_color)?,
            separator_thickness: clamp_field(
                "separatorThickness",
                self.separator_thickness,
                d.separator_thickness,
                SEPARATOR_THICKNESS_RANGE,
            ),
        })
    }
}

fn clamp_field(name: &str, value: Option<f64>, default: u32, range: RangeInclusive<u32>) -> u32 {
    let Some(raw) = value.filter(|v| v.is_finite()) else {
        return default;
    };
    let lo = *range.start() as f64;
    let hi = *range.end() as f64;
    let clamped = raw.round().clamp(lo, hi);
    if clamped != raw {
        debug!("Setting {} = {} adjusted to {}", name, raw, clamped);
    }
    clamped as u32
}

fn color_field(field: &'static str, value: Option<&str>, default: Rgb<u8>) -> SettingsResult<Rgb<u8>> {
    match value {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Ok(default),
        Some(s) => parse_hex_color(s).ok_or_else(|| SettingsError::InvalidColor {
            field,
            value: s.to_string(),
        }),
    }
}

/// Parse `#RRGGBB` or `RRGGBB`
pub fn parse_hex_color(s: &str) -> Option<Rgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
        assert_eq!(Settings::from_json("").unwrap(), Settings::default());
    }

    #[test]
    fn test_web_client_payload() {
        let json = r##"{
            "threshold": 45, "minArea": 12, "dilationIter": 0, "circleThickness": 4,
            "circleColor": "#00ff00", "overlayColor": "#0000FF", "overlayOpacity": 0,
            "touchDistance": 25, "imageSpacing": 0, "separatorColor": "#000000",
            "separatorThickness": 3
        }"##;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.threshold, 45);
        assert_eq!(settings.min_area, 12);
        assert_eq!(settings.dilation_iter, 0);
        assert_eq!(settings.circle_thickness, 4);
        assert_eq!(settings.circle_color, Rgb([0, 255, 0]));
        assert_eq!(settings.overlay_color, Rgb([0, 0, 255]));
        assert_eq!(settings.overlay_opacity, 0);
        assert_eq!(settings.touch_distance, 25);
        assert_eq!(settings.image_spacing, 0);
        assert_eq!(settings.separator_thickness, 3);
    }

    #[test]
    fn test_clamped_pulls_fields_into_range() {
        let wild = Settings {
            threshold: 0,
            min_area: 0,
            dilation_iter: 99,
            circle_thickness: u32::MAX,
            touch_distance: 0,
            image_spacing: u32::MAX,
            separator_thickness: 0,
            ..Settings::default()
        }
        .clamped();
        assert_eq!(wild.threshold, 1);
        assert_eq!(wild.min_area, 1);
        assert_eq!(wild.dilation_iter, 10);
        assert_eq!(wild.circle_thickness, 10);
        assert_eq!(wild.touch_distance, 1);
        assert_eq!(wild.image_spacing, 100);
        assert_eq!(wild.separator_thickness, 1);
        assert_eq!(wild.circle_color, Settings::default().circle_color);

        assert_eq!(Settings::default().clamped(), Settings::default());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let json = r#"{
            "threshold": 0, "minArea": 5000, "dilationIter": -3, "circleThickness": 99,
            "overlayOpacity": 300, "touchDistance": 0, "imageSpacing": 250.7,
            "separatorThickness": 0
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.threshold, 1);
        assert_eq!(settings.min_area, 200);
        assert_eq!(settings.dilation_iter, 0);
        assert_eq!(settings.circle_thickness, 10);
        assert_eq!(settings.overlay_opacity, 255);
        assert_eq!(settings.touch_distance, 1);
        assert_eq!(settings.image_spacing, 100);
        assert_eq!(settings.separator_thickness, 1);
    }

    #[test]
    fn test_invalid_color_is_rejected() {
        let err = Settings::from_json(r#"{"circleColor": "red"}"#).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidColor { field: "circleColor", .. }));
        assert!(matches!(
            Settings::from_json("not json").unwrap_err(),
            SettingsError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("FF0000"), Some(Rgb([255, 0, 0])));
        assert_eq!(parse_hex_color("#87ceeb"), Some(Rgb([0x87, 0xCE, 0xEB])));
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("GG0000"), None);
    }
}
