//! Vertical stacking of page images into one composite.
//!
//! The model receives the whole report as a single image, so every page is
//! pasted onto one canvas: `width = max(page widths)`,
//! `height = sum(page heights)`, page `k` at `(0, h_0 + … + h_{k-1})`.
//! Narrower pages are left-aligned; the uncovered area stays black.

use crate::error::CompositeError;
use crate::output::{CompositeImage, PageImage, PagePlacement};
use image::{imageops, RgbImage};
use tracing::debug;

/// Stack `pages` top to bottom in input order.
///
/// Each page buffer is dropped right after it has been pasted, so peak memory
/// is roughly the canvas plus one page.
pub fn compose(pages: Vec<PageImage>) -> Result<CompositeImage, CompositeError> {
    if pages.is_empty() {
        return Err(CompositeError::EmptyInput);
    }

    let (width, height) = canvas_size(&pages)?;
    let mut canvas = RgbImage::new(width, height);
    let mut placements = Vec::with_capacity(pages.len());
    let mut y_offset: u32 = 0;

    for page in pages {
        let (w, h) = (page.width(), page.height());
        let rgb = page.image.into_rgb8();
        imageops::replace(&mut canvas, &rgb, 0, i64::from(y_offset));
        placements.push(PagePlacement {
            index: page.index,
            x: 0,
            y: y_offset,
            width: w,
            height: h,
        });
        y_offset += h;
    }

    debug!(
        "Composited {} pages → {}x{} px",
        placements.len(),
        width,
        height
    );

    Ok(CompositeImage {
        image: canvas,
        placements,
    })
}

fn canvas_size(pages: &[PageImage]) -> Result<(u32, u32), CompositeError> {
    let width = pages.iter().map(PageImage::width).max().unwrap_or(0);
    let height: u64 = pages.iter().map(|p| u64::from(p.height())).sum();
    if width == 0 || height == 0 {
        // An all-empty page list would produce a zero-size image
        return Err(CompositeError::EmptyInput);
    }
    let height = u32::try_from(height).map_err(|_| CompositeError::TooLarge {
        width: u64::from(width),
        height,
    })?;
    Ok((width, height))
}
