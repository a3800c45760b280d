//! PDF content stream generation.
//!
//! This module provides:
//! - Graphics state and transformation operators
//! - Image XObject placement and embedding
//! - Text rendering with a single page font
//! - String escaping and stream compression

use anyhow::Result;
use image::GrayImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::io::Write;

use crate::layout::Rect;

/// Resource name of the label font on every page.
pub const FONT_RESOURCE: &str = "F1";

/// Builder for one page's content stream and the XObjects it references
#[derive(Debug, Default)]
pub struct ContentBuilder {
    pub content_parts: Vec<String>,
    pub xobjects: Dictionary,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self) {
        self.content_parts.push("q".to_string());
    }

    pub fn restore_state(&mut self) {
        self.content_parts.push("Q".to_string());
    }

    /// Concatenate `[a b c d e f]` onto the current transformation matrix
    pub fn transform(&mut self, matrix: [f64; 6]) {
        let [a, b, c, d, e, f] = matrix.map(format_number);
        self.content_parts
            .push(format!("{} {} {} {} {} {} cm", a, b, c, d, e, f));
    }

    /// Paint an already embedded XObject over `rect`
    pub fn draw_xobject(&mut self, name: &str, image_id: ObjectId, rect: Rect) {
        self.xobjects.set(name, Object::Reference(image_id));
        self.content_parts.push(format!(
            "q {} 0 0 {} {} {} cm /{} Do Q",
            format_number(rect.width()),
            format_number(rect.height()),
            format_number(rect.min.x),
            format_number(rect.min.y),
            name
        ));
    }

    /// Show `text` with its baseline at the current origin
    pub fn add_text(&mut self, text: &str, font_size: f64) {
        self.content_parts.push(format!(
            "BT 0 g /{} {} Tf 0 0 Td ({}) Tj ET",
            FONT_RESOURCE,
            format_number(font_size),
            escape_pdf_string(text)
        ));
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.join("\n").into_bytes()
    }
}

/// Embed a grayscale image as an XObject and return its object id
pub fn embed_gray_image(doc: &mut Document, image: &GrayImage) -> Result<ObjectId> {
    let compressed_bytes = compress_data(image.as_raw())?;

    let img_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width() as i64,
        "Height" => image.height() as i64,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8_i64,
        "Interpolate" => false,
        "Filter" => "FlateDecode",
    };
    Ok(doc.add_object(Stream::new(img_dict, compressed_bytes)))
}

/// Format a number for a content stream, without exponent or float noise
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{}", rounded)
}

/// Escape special characters in PDF strings
pub fn escape_pdf_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '(' => result.push_str(r"\("),
            ')' => result.push_str(r"\)"),
            '\\' => result.push_str(r"\\"),
            '\n' => result.push_str(r"\n"),
            '\r' => result.push_str(r"\r"),
            '\t' => result.push_str(r"\t"),
            _ => result.push(c),
        }
    }
    result
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;
    use image::Luma;

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("hello"), "hello");
        assert_eq!(escape_pdf_string("(hello)"), r"\(hello\)");
        assert_eq!(escape_pdf_string("hello\\world"), r"hello\\world");
        assert_eq!(escape_pdf_string("line1\nline2"), r"line1\nline2");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(108.0), "108");
        assert_eq!(format_number(66.25), "66.25");
        assert_eq!(format_number(f64::cos(std::f64::consts::FRAC_PI_2)), "0");
        assert_eq!(format_number(-1e-12), "0");
        assert_eq!(format_number(0.907407407), "0.9074");
    }

    #[test]
    fn test_content_builder_new() {
        let builder = ContentBuilder::new();
        assert!(builder.content_parts.is_empty());
        assert!(builder.xobjects.is_empty());
    }

    #[test]
    fn test_content_builder_ops() {
        let mut builder = ContentBuilder::new();
        builder.save_state();
        builder.transform([1.0, 0.0, 0.0, 1.0, 66.25, 36.0]);
        builder.add_text("BCID (1)", 8.0);
        builder.restore_state();

        let content = String::from_utf8(builder.build_content_bytes()).unwrap();
        assert_eq!(
            content,
            "q\n1 0 0 1 66.25 36 cm\nBT 0 g /F1 8 Tf 0 0 Td (BCID \\(1\\)) Tj ET\nQ"
        );
    }

    #[test]
    fn test_draw_xobject_registers_resource() {
        let mut doc = Document::with_version("1.5");
        let image = GrayImage::from_pixel(2, 2, Luma([0u8]));
        let id = embed_gray_image(&mut doc, &image).unwrap();

        let mut builder = ContentBuilder::new();
        let rect = Rect {
            min: Point::default(),
            max: Point { x: 108.0, y: 108.0 },
        };
        builder.draw_xobject("Im1", id, rect);

        assert_eq!(builder.content_parts, vec!["q 108 0 0 108 0 0 cm /Im1 Do Q"]);
        assert_eq!(
            builder.xobjects.get(b"Im1").unwrap().as_reference().unwrap(),
            id
        );
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 2);
    }
}
