//! Label sheet geometry.
//!
//! All values are in points with the PDF origin at the bottom-left of the
//! page, so row 0 is the bottom row of labels.

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::config::points;

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned rectangle given by its lower-left and upper-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// True if the interiors of both rectangles intersect.
    #[cfg(test)]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }
}

/// Geometry of a sticker sheet: label size, page size, gaps and grid.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LabelSheet {
    #[serde(deserialize_with = "points")]
    pub label_width: f64,
    #[serde(deserialize_with = "points")]
    pub label_height: f64,
    #[serde(deserialize_with = "points")]
    pub page_width: f64,
    #[serde(deserialize_with = "points")]
    pub page_height: f64,
    pub rows: usize,
    pub cols: usize,
    /// Vertical gap between adjacent rows.
    #[serde(deserialize_with = "points")]
    pub row_gap: f64,
    /// Horizontal gap between adjacent columns.
    #[serde(deserialize_with = "points")]
    pub col_gap: f64,
}

impl LabelSheet {
    /// Number of labels on one page; saturates on absurd grids, which
    /// `validate` rejects.
    pub fn capacity(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Label rectangles for one page, row-major from the bottom-left label.
    ///
    /// The grid is centered on the page assuming an even number of rows and
    /// columns. `cols / 2` and `rows / 2` are integer divisions, so an odd
    /// grid is shifted by half a cell towards the top-right.
    pub fn positions(&self) -> Vec<Rect> {
        let x_base = axis_base(self.page_width, self.cols, self.label_width, self.col_gap);
        let y_base = axis_base(self.page_height, self.rows, self.label_height, self.row_gap);

        let mut labels = Vec::with_capacity(self.capacity());
        for row in 0..self.rows {
            let y = y_base + row as f64 * (self.label_height + self.row_gap);
            for col in 0..self.cols {
                let x = x_base + col as f64 * (self.label_width + self.col_gap);
                labels.push(Rect {
                    min: Point { x, y },
                    max: Point {
                        x: x + self.label_width,
                        y: y + self.label_height,
                    },
                });
            }
        }
        labels
    }

    /// Check that the grid is non-empty and lies on the page.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.rows > 0 && self.cols > 0,
            "sheet must have at least one row and column, got {}x{}",
            self.cols,
            self.rows
        );
        let capacity = self.rows.checked_mul(self.cols);
        ensure!(
            capacity.is_some_and(|n| n <= MAX_LABELS_PER_PAGE),
            "{}x{} grid exceeds {} labels per page",
            self.cols,
            self.rows,
            MAX_LABELS_PER_PAGE
        );
        ensure!(
            self.label_width > 0.0 && self.label_height > 0.0,
            "label size must be positive, got {} x {} pt",
            self.label_width,
            self.label_height
        );
        ensure!(
            self.page_width > 0.0 && self.page_height > 0.0,
            "page size must be positive, got {} x {} pt",
            self.page_width,
            self.page_height
        );
        ensure!(
            self.row_gap >= 0.0 && self.col_gap >= 0.0,
            "gaps must not be negative, got row gap {} pt, column gap {} pt",
            self.row_gap,
            self.col_gap
        );

        let grid_width = self.cols as f64 * self.label_width + (self.cols - 1) as f64 * self.col_gap;
        let grid_height =
            self.rows as f64 * self.label_height + (self.rows - 1) as f64 * self.row_gap;
        ensure!(
            grid_width <= self.page_width + EPSILON,
            "{} columns need {} pt but the page is {} pt wide",
            self.cols,
            grid_width,
            self.page_width
        );
        ensure!(
            grid_height <= self.page_height + EPSILON,
            "{} rows need {} pt but the page is {} pt tall",
            self.rows,
            grid_height,
            self.page_height
        );

        // Odd grids are off-center and may still spill over an edge.
        if let Some(outside) = self.positions().into_iter().find(|r| !self.on_page(r)) {
            anyhow::bail!(
                "label at ({:.2}, {:.2}) falls outside the {} x {} pt page",
                outside.min.x,
                outside.min.y,
                self.page_width,
                self.page_height
            );
        }

        if self.rows % 2 != 0 || self.cols % 2 != 0 {
            log::warn!(
                "{}x{} grid has an odd dimension; labels are not centered on the page",
                self.cols,
                self.rows
            );
        }
        Ok(())
    }

    fn on_page(&self, rect: &Rect) -> bool {
        rect.min.x >= -EPSILON
            && rect.min.y >= -EPSILON
            && rect.max.x <= self.page_width + EPSILON
            && rect.max.y <= self.page_height + EPSILON
    }
}

const EPSILON: f64 = 1e-9;

/// Upper bound on `rows * cols`, far above any printable sticker sheet.
pub const MAX_LABELS_PER_PAGE: usize = 10_000;

fn axis_base(page: f64, count: usize, label: f64, gap: f64) -> f64 {
    page / 2.0 - (count / 2) as f64 * (label + gap) + gap / 2.0
}
