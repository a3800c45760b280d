//! QR code generation.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};

/// Encode `data` at error correction level L.
///
/// The image has one pixel per module plus the standard four-module quiet
/// zone; it is meant to be scaled up without interpolation.
pub fn encode(data: &str) -> Result<GrayImage> {
    let qr_code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .with_context(|| format!("{} bytes do not fit in a level L QR code", data.len()))?;

    let img = qr_code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(1, 1)
        .light_color(Luma([255u8]))
        .dark_color(Luma([0u8]))
        .build();
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_label_url() {
        let img = encode("http://bcing.me/590-12729239").unwrap();
        assert_eq!(img.width(), img.height());
        // version N is 17 + 4N modules, plus 4 quiet modules per side
        assert_eq!((img.width() - 8 - 17) % 4, 0);
        // quiet zone is white, finder pattern corner is black
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        assert_eq!(img.get_pixel(4, 4), &Luma([0u8]));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode("http://bcing.me/590-1").unwrap();
        let b = encode("http://bcing.me/590-1").unwrap();
        let c = encode("http://bcing.me/590-2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_encode_too_long() {
        let err = encode(&"x".repeat(4000)).unwrap_err();
        assert!(err.to_string().contains("4000 bytes"));
    }
}
