//! Configuration loading and parsing.
//!
//! This module handles:
//! - Dimension values with units (pt, mm, cm, in)
//! - Built-in label sheet presets and template JSON files
//! - Label style settings (host, byline, text size, font)
//! - Label lists from CSV files

use anyhow::{Context, Result, anyhow, ensure};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use crate::layout::LabelSheet;
use crate::writer::LabelContent;

/// Points per inch (PDF default user-space unit is 1/72 inch).
pub const INCH: f64 = 72.0;

/// Avery 22805: 1.5" square labels, 4 x 6 on US Letter.
pub const AVERY_22805: LabelSheet = LabelSheet {
    label_width: 1.5 * INCH,
    label_height: 1.5 * INCH,
    page_width: 8.5 * INCH,
    page_height: 11.0 * INCH,
    rows: 6,
    cols: 4,
    row_gap: 0.2 * INCH,
    col_gap: 0.3125 * INCH,
};

/// Names accepted by `--sheet`.
pub const PRESETS: &[(&str, LabelSheet)] = &[("avery-22805", AVERY_22805)];

pub const DEFAULT_HOST: &str = "bcing.me";
pub const DEFAULT_BYLINE: &str = "Ex libris Miki dichro@rcpt.to";
pub const DEFAULT_TEXT_SIZE: f64 = 8.0;
pub const DEFAULT_FONT: &str = "Helvetica";

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1.5 in", "8pt"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // The unit is the trailing run of letters, so "1e-3 in" keeps its exponent.
        let split = value
            .trim_end_matches(|c: char| c.is_ascii_alphabetic())
            .len();
        let (num_str, unit) = value.split_at(split);
        let unit = unit.trim().to_lowercase();

        let num: f64 = num_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid number in dimension: {}", num_str.trim()))?;

        let points = match unit.as_str() {
            "" | "pt" | "point" | "points" => num,
            "mm" => num * INCH / 25.4,
            "cm" => num * INCH / 2.54,
            "in" | "inch" | "inches" => num * INCH,
            _ => {
                return Err(format!(
                    "unknown unit '{}'. Supported: mm, cm, in, pt",
                    unit
                ));
            }
        };

        Ok(Dimension(points))
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a number or a string with unit (e.g., \"100 mm\", \"1.5 in\")")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Dimension(value))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

/// `deserialize_with` helper storing a [`Dimension`] as plain points.
pub fn points<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Dimension::deserialize(deserializer).map(|d| d.as_points())
}

/// Look up a built-in sheet template by name (case-insensitive).
pub fn preset(name: &str) -> Result<LabelSheet> {
    PRESETS
        .iter()
        .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
        .map(|(_, sheet)| *sheet)
        .ok_or_else(|| {
            let known: Vec<&str> = PRESETS.iter().map(|(n, _)| *n).collect();
            anyhow!("unknown sheet preset '{}'. Known presets: {}", name, known.join(", "))
        })
}

/// Per-run text and QR settings shared by every label.
#[derive(Debug, Clone)]
pub struct LabelStyle {
    /// Host part of the encoded URL, `http://<host>/<group>-<id>`.
    pub host: String,
    /// Attribution line printed in the top-right corner of every label.
    pub byline: String,
    /// Font size of both text lines, in points.
    pub text_size: f64,
    /// Standard font name, TrueType file path or system font family.
    pub font: String,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            byline: DEFAULT_BYLINE.to_string(),
            text_size: DEFAULT_TEXT_SIZE,
            font: DEFAULT_FONT.to_string(),
        }
    }
}

impl LabelStyle {
    /// Headroom reserved under the QR code for the vertical caption.
    pub fn caption_margin(&self) -> f64 {
        1.25 * self.text_size
    }

    /// Scale applied to the QR code so it leaves room for the caption.
    pub fn qr_scale(&self, sheet: &LabelSheet) -> f64 {
        (sheet.label_height - self.caption_margin()) / sheet.label_height
    }

    /// Reject settings that would draw garbage on this sheet.
    pub fn validate(&self, sheet: &LabelSheet) -> Result<()> {
        ensure!(!self.host.trim().is_empty(), "host must not be empty");
        ensure!(
            self.text_size > 0.0,
            "text size must be positive, got {} pt",
            self.text_size
        );
        ensure!(
            self.byline.chars().all(|c| c.is_ascii() && !c.is_ascii_control()),
            "byline must be printable ASCII: {:?}",
            self.byline
        );
        ensure!(
            sheet.label_height > self.caption_margin(),
            "label height {} pt leaves no room for the QR code with {} pt text (needs more than {} pt)",
            sheet.label_height,
            self.text_size,
            self.caption_margin()
        );
        Ok(())
    }
}

/// Helper function to open a file with consistent error context
fn open_file_with_context(path: &Path, description: &str) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open {} at {:?}", description, path))
}

pub fn load_template(path: &Path) -> Result<LabelSheet> {
    let file = open_file_with_context(path, "template")?;
    let reader = BufReader::new(file);
    let sheet: LabelSheet = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse template {:?}", path))?;
    Ok(sheet)
}

/// Load labels from a CSV file with `group` and `id` columns.
pub fn load_label_csv(path: &Path) -> Result<Vec<LabelContent>> {
    let file = open_file_with_context(path, "label list")?;
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(file);

    let mut labels = Vec::new();
    for (line, result) in rdr.deserialize::<LabelContent>().enumerate() {
        let label: LabelContent =
            result.with_context(|| format!("Invalid label on data row {}", line + 1))?;
        labels.push(label);
    }
    Ok(labels)
}

/// `count` consecutive ids in one group, starting at `start_id`.
pub fn sequential_labels(group: u32, start_id: u64, count: u64) -> Result<Vec<LabelContent>> {
    start_id
        .checked_add(count)
        .with_context(|| format!("id range {}+{} overflows", start_id, count))?;
    Ok((start_id..start_id + count)
        .map(|id| LabelContent { group, id })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_dimension_from_number() {
        let dim: Dimension = serde_json::from_value(json!(100)).unwrap();
        assert_eq!(dim.as_points(), 100.0);
    }

    #[test]
    fn test_dimension_from_f64() {
        let dim: Dimension = serde_json::from_value(json!(12.5)).unwrap();
        assert_eq!(dim.as_points(), 12.5);
    }

    #[test]
    fn test_dimension_from_inch() {
        let dim: Dimension = serde_json::from_value(json!("1.5 in")).unwrap();
        assert_eq!(dim.as_points(), 108.0);
    }

    #[test]
    fn test_dimension_from_mm() {
        let dim: Dimension = serde_json::from_value(json!("100 mm")).unwrap();
        // 100 mm = 100 * 72 / 25.4 points ≈ 283.46
        assert!((dim.as_points() - 283.46).abs() < 0.01);
    }

    #[test]
    fn test_dimension_without_space() {
        let dim: Dimension = "8pt".parse().unwrap();
        assert_eq!(dim.as_points(), 8.0);
        let dim: Dimension = "2.54cm".parse().unwrap();
        assert!((dim.as_points() - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_scientific_notation() {
        let dim: Dimension = "1e-3 in".parse().unwrap();
        assert!((dim.as_points() - 0.072).abs() < 1e-12);
        let dim: Dimension = "1e2".parse().unwrap();
        assert_eq!(dim.as_points(), 100.0);
        let dim: Dimension = serde_json::from_value(json!("2.5E1mm")).unwrap();
        assert!((dim.as_points() - 25.0 * 72.0 / 25.4).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_whitespace_and_case() {
        let dim: Dimension = serde_json::from_value(json!("  1  IN  ")).unwrap();
        assert_eq!(dim.as_points(), 72.0);
    }

    #[test]
    fn test_dimension_invalid_unit() {
        let result: Result<Dimension, _> = serde_json::from_value(json!("100 foo"));
        assert!(result.is_err());
    }

    #[test]
    fn test_dimension_invalid_number() {
        assert!("abc mm".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_template_with_units() {
        let json = json!({
            "label_width": "1.5 in",
            "label_height": 108,
            "page_width": "8.5 in",
            "page_height": "11 in",
            "rows": 6,
            "cols": 4,
            "row_gap": "0.2 in",
            "col_gap": "0.3125 in"
        });
        let sheet: LabelSheet = serde_json::from_value(json).unwrap();
        assert_eq!(sheet, AVERY_22805);
    }

    #[test]
    fn test_template_missing_field() {
        let json = json!({ "label_width": 10, "label_height": 10 });
        assert!(serde_json::from_value::<LabelSheet>(json).is_err());
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(preset("Avery-22805").unwrap(), AVERY_22805);
        let err = preset("avery-5160").unwrap_err();
        assert!(err.to_string().contains("avery-22805"));
    }

    #[test]
    fn test_default_style_fits_avery() {
        let style = LabelStyle::default();
        style.validate(&AVERY_22805).unwrap();
        // (108 - 10) / 108
        assert!((style.qr_scale(&AVERY_22805) - 98.0 / 108.0).abs() < 1e-12);
    }

    #[test]
    fn test_style_rejects_degenerate_qr_scale() {
        let style = LabelStyle {
            text_size: 86.4,
            ..LabelStyle::default()
        };
        // 1.25 * 86.4 == 108: zero QR scale
        assert!(style.validate(&AVERY_22805).is_err());
    }

    #[test]
    fn test_style_rejects_non_ascii_byline() {
        let style = LabelStyle {
            byline: "Ex libris Mikí".to_string(),
            ..LabelStyle::default()
        };
        assert!(style.validate(&AVERY_22805).is_err());
    }

    #[test]
    fn test_sequential_labels() {
        let labels = sequential_labels(590, 12729239, 3).unwrap();
        let ids: Vec<u64> = labels.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![12729239, 12729240, 12729241]);
        assert!(labels.iter().all(|l| l.group == 590));
        assert!(sequential_labels(1, u64::MAX, 2).is_err());
    }

    #[test]
    fn test_load_label_csv() {
        let path = std::env::temp_dir().join(format!("qr_label_sheet_{}.csv", std::process::id()));
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "group,id").unwrap();
            writeln!(file, "590, 12729239").unwrap();
            writeln!(file, "591,7").unwrap();
        }
        let labels = load_label_csv(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            labels,
            vec![
                LabelContent { group: 590, id: 12729239 },
                LabelContent { group: 591, id: 7 },
            ]
        );
    }

    #[test]
    fn test_load_template_missing_file() {
        let err = load_template(Path::new("/nonexistent/template.json")).unwrap_err();
        assert!(err.to_string().contains("template"));
    }
}
