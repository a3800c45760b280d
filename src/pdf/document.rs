use anyhow::{Context, Result};
use image::GrayImage;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use super::Canvas;
use super::content::{ContentBuilder, embed_gray_image};
use super::fonts::LabelFont;
use super::resources::page_resources;
use crate::layout::Rect;

/// A [`Canvas`] that builds a PDF document in memory with lopdf
pub struct PdfCanvas {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    font: LabelFont,
    page_ids: Vec<ObjectId>,
    page_size: Option<(f64, f64)>,
    content: ContentBuilder,
}

impl PdfCanvas {
    /// Create an empty document that draws text in `font`
    pub fn new(font: LabelFont) -> Result<Self> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = font
            .embed(&mut doc)
            .with_context(|| format!("Failed to embed font {}", font.name()))?;

        Ok(Self {
            doc,
            pages_id,
            font_id,
            font,
            page_ids: Vec::new(),
            page_size: None,
            content: ContentBuilder::new(),
        })
    }

    /// Pages committed so far
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Write the page tree, catalog and info dictionary and return the document
    pub fn into_document(mut self) -> Document {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal("QR label sheet"),
            "Producer" => Object::string_literal(concat!("qr_label_sheet ", env!("CARGO_PKG_VERSION"))),
        });
        self.doc.trailer.set("Info", info_id);
        self.doc
    }

    /// Serialize the finished document
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut doc = self.into_document();
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .with_context(|| "Failed to serialize PDF")?;
        Ok(buffer)
    }
}

impl Canvas for PdfCanvas {
    fn begin_page(&mut self, width: f64, height: f64) {
        self.page_size = Some((width, height));
        self.content = ContentBuilder::new();
    }

    fn end_page(&mut self) -> Result<()> {
        let Some((width, height)) = self.page_size.take() else {
            return Ok(());
        };
        let content = std::mem::take(&mut self.content);

        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.build_content_bytes()));
        let resources_id = self
            .doc
            .add_object(page_resources(self.font_id, &content.xobjects));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::from(width as f32),
                Object::from(height as f32),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        self.page_ids.push(page_id);
        log::debug!("committed page {} ({} x {} pt)", self.page_ids.len(), width, height);
        Ok(())
    }

    fn save_state(&mut self) {
        self.content.save_state();
    }

    fn restore_state(&mut self) {
        self.content.restore_state();
    }

    fn translate(&mut self, x: f64, y: f64) {
        self.content.transform([1.0, 0.0, 0.0, 1.0, x, y]);
    }

    fn scale(&mut self, sx: f64, sy: f64) {
        self.content.transform([sx, 0.0, 0.0, sy, 0.0, 0.0]);
    }

    fn rotate(&mut self, radians: f64) {
        let (sin, cos) = radians.sin_cos();
        self.content.transform([cos, sin, -sin, cos, 0.0, 0.0]);
    }

    fn draw_image(&mut self, image: &GrayImage, rect: Rect) -> Result<()> {
        let image_id = embed_gray_image(&mut self.doc, image)?;
        let name = format!("Im{}", image_id.0);
        self.content.draw_xobject(&name, image_id, rect);
        Ok(())
    }

    fn text_width(&self, text: &str, size: f64) -> f64 {
        self.font.text_width(text, size)
    }

    fn draw_text(&mut self, text: &str, size: f64) {
        self.content.add_text(text, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AVERY_22805, LabelStyle};
    use crate::writer::LabelSheetWriter;

    fn generate(count: u64) -> Document {
        let canvas = PdfCanvas::new(LabelFont::default()).unwrap();
        let mut writer = LabelSheetWriter::new(AVERY_22805, LabelStyle::default(), canvas).unwrap();
        for i in 0..count {
            writer.write(590, 12729239 + i).unwrap();
        }
        let bytes = writer.finish().unwrap().to_bytes().unwrap();
        Document::load_mem(&bytes).unwrap()
    }

    fn page_text(doc: &Document, page_number: u32) -> String {
        let page_id = doc.get_pages()[&page_number];
        String::from_utf8(doc.get_page_content(page_id).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_document_has_no_pages() {
        let doc = generate(0);
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn test_full_sheet_single_page() {
        let doc = generate(24);
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page = doc.get_dictionary(pages[&1]).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 612.0);
        assert_eq!(media_box[3].as_float().unwrap(), 792.0);

        let text = page_text(&doc, 1);
        assert_eq!(text.matches(" Do Q").count(), 24);
        assert_eq!(text.matches("(Ex libris Miki dichro@rcpt.to) Tj").count(), 24);
        assert!(text.contains("(BCID 590-12729239) Tj"));
        assert!(text.contains("(BCID 590-12729262) Tj"));
        // first QR sits 10 pt right of the bottom-left label
        assert!(text.contains("1 0 0 1 66.25 36 cm"));
        // caption rotation
        assert!(text.contains("0 1 -1 0 0 0 cm"));
    }

    #[test]
    fn test_overflow_second_page_has_one_label() {
        let doc = generate(25);
        assert_eq!(doc.get_pages().len(), 2);

        let second = page_text(&doc, 2);
        assert_eq!(second.matches(" Do Q").count(), 1);
        assert!(second.contains("(BCID 590-12729263) Tj"));
        assert!(second.contains("1 0 0 1 66.25 36 cm"));
    }

    #[test]
    fn test_page_resources_reference_images() {
        let doc = generate(2);
        let page = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        let resources_id = page.get(b"Resources").unwrap().as_reference().unwrap();
        let resources = doc.get_dictionary(resources_id).unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert_eq!(xobjects.len(), 2);
        for (_, image) in xobjects.iter() {
            let stream = doc.get_object(image.as_reference().unwrap()).unwrap();
            let dict = &stream.as_stream().unwrap().dict;
            assert_eq!(dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        }
    }

    #[test]
    fn test_end_page_without_page_is_noop() {
        let mut canvas = PdfCanvas::new(LabelFont::default()).unwrap();
        canvas.end_page().unwrap();
        assert_eq!(canvas.page_count(), 0);
        canvas.begin_page(100.0, 100.0);
        canvas.end_page().unwrap();
        canvas.end_page().unwrap();
        assert_eq!(canvas.page_count(), 1);
    }
}
