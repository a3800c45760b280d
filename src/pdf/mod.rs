//! PDF output: the drawing surface used by the label writer.

pub mod content;
pub mod document;
pub mod fonts;
pub mod qr;
mod resources;

use anyhow::Result;
use image::GrayImage;

use crate::layout::Rect;

pub use document::PdfCanvas;
pub use fonts::LabelFont;

/// A paged 2D drawing surface with a graphics-state stack.
///
/// Transforms compose with the current transformation matrix and are undone
/// by [`restore_state`](Canvas::restore_state). Text is drawn with its
/// baseline origin at the current user-space origin.
pub trait Canvas {
    /// Start a new page of the given size in points.
    fn begin_page(&mut self, width: f64, height: f64);

    /// Commit the current page to the document.
    fn end_page(&mut self) -> Result<()>;

    fn save_state(&mut self);

    fn restore_state(&mut self);

    fn translate(&mut self, x: f64, y: f64);

    fn scale(&mut self, sx: f64, sy: f64);

    /// Rotate counter-clockwise by `radians`.
    fn rotate(&mut self, radians: f64);

    /// Draw `image` stretched over `rect` in user space.
    fn draw_image(&mut self, image: &GrayImage, rect: Rect) -> Result<()>;

    /// Advance width of `text` at `size` points.
    fn text_width(&self, text: &str, size: f64) -> f64;

    fn draw_text(&mut self, text: &str, size: f64);
}
