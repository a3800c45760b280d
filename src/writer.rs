//! Sequential label placement with pagination.
//!
//! [`Pagination`] decides which slot the next label goes into and when a page
//! must be opened or closed; [`LabelSheetWriter`] draws each label into that
//! slot on a [`Canvas`].

use anyhow::{Context, Result};
use image::GrayImage;
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;
use std::fmt;

use crate::config::LabelStyle;
use crate::layout::{LabelSheet, Point, Rect};
use crate::pdf::{Canvas, qr};

/// One label's identity: the `group-id` pair printed and encoded on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LabelContent {
    pub group: u32,
    pub id: u64,
}

impl LabelContent {
    pub fn url(&self, host: &str) -> String {
        format!("http://{}/{}", host, self)
    }

    pub fn caption(&self) -> String {
        format!("BCID {}", self)
    }
}

impl fmt::Display for LabelContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group, self.id)
    }
}

/// Fill state of the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// No page is open.
    Empty,
    /// A page is open with this many labels placed, fewer than its capacity.
    Partial(usize),
    /// A page is open and every position on it is used.
    Full,
}

/// Page bookkeeping required before a label can be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageBreak {
    None,
    /// Open the first page.
    Open,
    /// Close the full page, then open a new one.
    CloseAndOpen,
}

/// Where the next label goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Index into the page's label positions.
    pub index: usize,
    pub page_break: PageBreak,
}

/// Pagination cursor over pages of `capacity` labels each.
#[derive(Debug, Clone)]
pub struct Pagination {
    capacity: usize,
    fill: Fill,
    pages: usize,
}

impl Pagination {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "pagination needs at least one slot per page");
        Self {
            capacity,
            fill: Fill::Empty,
            pages: 0,
        }
    }

    #[cfg(test)]
    pub fn fill(&self) -> Fill {
        self.fill
    }

    /// Pages opened so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Claim the next slot, moving to a fresh page when needed.
    pub fn next_slot(&mut self) -> Slot {
        let (index, page_break) = match self.fill {
            Fill::Empty => (0, PageBreak::Open),
            Fill::Full => (0, PageBreak::CloseAndOpen),
            Fill::Partial(used) => (used, PageBreak::None),
        };
        if page_break != PageBreak::None {
            self.pages += 1;
        }

        let used = index + 1;
        self.fill = if used >= self.capacity {
            Fill::Full
        } else {
            Fill::Partial(used)
        };
        Slot { index, page_break }
    }

    /// Mark everything consumed. Returns whether a page was open.
    pub fn finish(&mut self) -> bool {
        let open = self.fill != Fill::Empty;
        self.fill = Fill::Empty;
        open
    }
}

/// Writes labels one after another onto sheets laid out by a [`LabelSheet`].
pub struct LabelSheetWriter<C: Canvas> {
    sheet: LabelSheet,
    style: LabelStyle,
    positions: Vec<Rect>,
    pagination: Pagination,
    canvas: C,
}

impl<C: Canvas> LabelSheetWriter<C> {
    /// Validate the sheet and style together and bind them to `canvas`.
    pub fn new(sheet: LabelSheet, style: LabelStyle, canvas: C) -> Result<Self> {
        sheet.validate().context("Invalid label sheet")?;
        style.validate(&sheet).context("Invalid label style")?;

        let positions = sheet.positions();
        let pagination = Pagination::new(positions.len());
        Ok(Self {
            sheet,
            style,
            positions,
            pagination,
            canvas,
        })
    }

    /// Pages opened so far.
    pub fn pages(&self) -> usize {
        self.pagination.pages()
    }

    /// Draw the label for `group-id` into the next free position.
    ///
    /// The QR code is encoded before any page state changes, so a failed
    /// write leaves the writer where it was.
    pub fn write(&mut self, group: u32, id: u64) -> Result<()> {
        let label = LabelContent { group, id };
        let url = label.url(&self.style.host);
        let qr_image = qr::encode(&url)
            .with_context(|| format!("Failed to encode QR code for label {}", label))?;

        let slot = self.pagination.next_slot();
        match slot.page_break {
            PageBreak::None => {}
            PageBreak::Open => {
                self.canvas.begin_page(self.sheet.page_width, self.sheet.page_height);
            }
            PageBreak::CloseAndOpen => {
                self.canvas
                    .end_page()
                    .with_context(|| format!("Failed to close page {}", self.pages() - 1))?;
                self.canvas.begin_page(self.sheet.page_width, self.sheet.page_height);
            }
        }
        if slot.page_break != PageBreak::None {
            log::debug!("opened page {}", self.pages());
        }

        let bounds = self.positions[slot.index];
        log::debug!(
            "label {} at slot {} ({:.2}, {:.2})",
            label,
            slot.index,
            bounds.min.x,
            bounds.min.y
        );
        self.draw_label(&label, &qr_image, bounds)
            .with_context(|| format!("Failed to draw label {}", label))
    }

    fn draw_label(&mut self, label: &LabelContent, qr_image: &GrayImage, bounds: Rect) -> Result<()> {
        let text_size = self.style.text_size;
        let margin = self.style.caption_margin();
        let qr_scale = self.style.qr_scale(&self.sheet);
        let qr_box = Rect {
            min: Point::default(),
            max: Point {
                x: self.sheet.label_width,
                y: self.sheet.label_height,
            },
        };

        with_saved_state(&mut self.canvas, |canvas| {
            canvas.translate(bounds.min.x + margin, bounds.min.y);
            canvas.scale(qr_scale, qr_scale);
            canvas.draw_image(qr_image, qr_box)
        })?;

        let byline = &self.style.byline;
        with_saved_state(&mut self.canvas, |canvas| {
            let width = canvas.text_width(byline, text_size);
            canvas.translate(bounds.max.x - width, bounds.max.y - text_size);
            canvas.draw_text(byline, text_size);
            Ok(())
        })?;

        let caption = label.caption();
        with_saved_state(&mut self.canvas, |canvas| {
            canvas.translate(bounds.min.x + text_size, bounds.min.y);
            canvas.rotate(FRAC_PI_2);
            canvas.draw_text(&caption, text_size);
            Ok(())
        })
    }

    /// Close the last page and hand back the canvas.
    pub fn finish(mut self) -> Result<C> {
        if self.pagination.finish() {
            self.canvas.end_page().context("Failed to close the last page")?;
        }
        Ok(self.canvas)
    }
}

fn with_saved_state<C: Canvas>(
    canvas: &mut C,
    draw: impl FnOnce(&mut C) -> Result<()>,
) -> Result<()> {
    canvas.save_state();
    let result = draw(canvas);
    canvas.restore_state();
    result
}
