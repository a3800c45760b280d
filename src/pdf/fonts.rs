use anyhow::{Context, Result, anyhow, bail};
use fontdb::Database;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use std::fs;
use std::path::Path;
use ttf_parser::Face;

use super::content::compress_data;

/// First and last character codes covered by width tables.
const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 126;

/// Helvetica advance widths for codes 32..=126 (StandardEncoding), in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 222, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    222, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Standard PDF Type1 fonts with built-in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    Courier,
}

impl StandardFont {
    /// Get the PDF BaseFont name for this font
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::Courier => "Courier",
        }
    }

    /// Parse a font name into a StandardFont
    pub fn from_name(name: &str) -> Option<StandardFont> {
        match name.to_lowercase().as_str() {
            "helvetica" => Some(StandardFont::Helvetica),
            "courier" => Some(StandardFont::Courier),
            _ => None,
        }
    }

    /// Advance width of `c` in 1/1000 em
    fn advance(&self, c: char) -> Option<u16> {
        let code = u8::try_from(c).ok().filter(|b| (FIRST_CHAR..=LAST_CHAR).contains(b))?;
        Some(match self {
            StandardFont::Helvetica => HELVETICA_WIDTHS[(code - FIRST_CHAR) as usize],
            StandardFont::Courier => 600,
        })
    }
}

/// A TrueType font to embed, with widths for the printable ASCII range
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    name: String,
    data: Vec<u8>,
    widths: Vec<u16>,
    ascent: i64,
    descent: i64,
    cap_height: i64,
    bbox: [i64; 4],
}

impl TrueTypeFont {
    /// Read a `.ttf` or `.otf` file; the file stem becomes the font name
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read font file: {:?}", path))?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("EmbeddedFont");
        Self::from_bytes(data, 0, name)
            .with_context(|| format!("Failed to load font file: {:?}", path))
    }

    /// Parse face `index` of `data`; collections are rejected since the PDF
    /// embeds the file as-is
    pub fn from_bytes(data: Vec<u8>, index: u32, name: &str) -> Result<Self> {
        if ttf_parser::fonts_in_collection(&data).is_some() || index != 0 {
            bail!("font collections (.ttc) cannot be embedded");
        }
        let face = Face::parse(&data, index).context("Failed to parse TrueType font")?;

        let per_mille = |units: i32| units as i64 * 1000 / face.units_per_em() as i64;
        let widths = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                face.glyph_index(char::from(code))
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(|advance| per_mille(advance as i32) as u16)
                    .unwrap_or(0)
            })
            .collect();
        let bbox = face.global_bounding_box();
        let ascent = per_mille(face.ascender() as i32);
        let descent = per_mille(face.descender() as i32);
        let cap_height = face
            .capital_height()
            .map(|h| per_mille(h as i32))
            .unwrap_or(ascent);
        let bbox = [
            per_mille(bbox.x_min as i32),
            per_mille(bbox.y_min as i32),
            per_mille(bbox.x_max as i32),
            per_mille(bbox.y_max as i32),
        ];

        Ok(Self {
            name: name.replace(' ', "-"),
            data,
            widths,
            ascent,
            descent,
            cap_height,
            bbox,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn advance(&self, c: char) -> Option<u16> {
        let code = u8::try_from(c).ok().filter(|b| (FIRST_CHAR..=LAST_CHAR).contains(b))?;
        self.widths.get((code - FIRST_CHAR) as usize).copied()
    }

    fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        let font_stream = Stream::new(
            dictionary! {
                "Length1" => self.data.len() as i64,
                "Filter" => "FlateDecode",
            },
            compress_data(&self.data)?,
        );
        let font_stream_id = doc.add_object(font_stream);

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => self.name.as_str(),
            "Flags" => 32_i64, // Nonsymbolic
            "FontBBox" => self.bbox.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
            "ItalicAngle" => 0_i64,
            "Ascent" => self.ascent,
            "Descent" => self.descent,
            "CapHeight" => self.cap_height,
            "StemV" => 80_i64,
            "FontFile2" => font_stream_id,
        });

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => self.name.as_str(),
            "FirstChar" => FIRST_CHAR as i64,
            "LastChar" => LAST_CHAR as i64,
            "Widths" => self.widths.iter().map(|w| Object::Integer(*w as i64)).collect::<Vec<_>>(),
            "Encoding" => "WinAnsiEncoding",
            "FontDescriptor" => descriptor_id,
        }))
    }
}

/// The font used for both text lines of a label
#[derive(Debug, Clone)]
pub enum LabelFont {
    Standard(StandardFont),
    TrueType(TrueTypeFont),
}

impl Default for LabelFont {
    fn default() -> Self {
        LabelFont::Standard(StandardFont::Helvetica)
    }
}

impl LabelFont {
    /// Resolve a standard font name, a font file path or an installed family
    pub fn resolve(name: &str) -> Result<Self> {
        if let Some(font) = StandardFont::from_name(name) {
            return Ok(LabelFont::Standard(font));
        }

        let path = Path::new(name);
        if path.is_file() {
            return Ok(LabelFont::TrueType(TrueTypeFont::load(path)?));
        }

        let (data, index) = find_system_font(name).ok_or_else(|| {
            anyhow!(
                "font '{}' is not a standard font (Helvetica, Courier), a font file or an installed family",
                name
            )
        })?;
        let font = TrueTypeFont::from_bytes(data, index, name)
            .with_context(|| format!("Failed to load system font '{}'", name))?;
        Ok(LabelFont::TrueType(font))
    }

    /// Display name for diagnostics
    pub fn name(&self) -> &str {
        match self {
            LabelFont::Standard(font) => font.base_font_name(),
            LabelFont::TrueType(font) => font.name(),
        }
    }

    /// Width of `text` at `size` points; unmapped characters count as zero
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: u32 = text
            .chars()
            .map(|c| {
                let advance = match self {
                    LabelFont::Standard(font) => font.advance(c),
                    LabelFont::TrueType(font) => font.advance(c),
                };
                advance.unwrap_or(0) as u32
            })
            .sum();
        units as f64 / 1000.0 * size
    }

    /// Add the font to `doc` and return the font dictionary id
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId> {
        match self {
            LabelFont::Standard(font) => Ok(doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font_name(),
            })),
            LabelFont::TrueType(font) => font.embed(doc),
        }
    }
}

/// Find an installed font by family name
fn find_system_font(family: &str) -> Option<(Vec<u8>, u32)> {
    let mut db = Database::new();
    db.load_system_fonts();

    let query = fontdb::Query {
        families: &[fontdb::Family::Name(family)],
        ..Default::default()
    };
    let id = db.query(&query)?;
    log::debug!("found system font '{}'", family);
    db.with_face_data(id, |data, index| (data.to_vec(), index))
}
