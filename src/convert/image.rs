//! Raster images: one page per image, sized to the picture.

use ::image::codecs::jpeg::JpegEncoder;
use ::image::{DynamicImage, Rgb, RgbImage};

use super::{Artifact, RenderOptions};
use crate::error::ConversionFailure;
use crate::model::attachment::Attachment;
use crate::pdf::writer::{PdfBuilder, MAX_PAGE_EDGE};

const JPEG_QUALITY: u8 = 90;

/// Render an image attachment onto a single page of the same proportions.
///
/// Only the first frame of animated or multi-page formats is used.
/// Transparent pixels are composited onto white.
pub fn convert(attachment: &Attachment, options: &RenderOptions) -> Result<Artifact, ConversionFailure> {
    let decoded = ::image::load_from_memory(&attachment.content)
        .map_err(|e| ConversionFailure::CorruptImage(e.to_string()))?;
    let (px_width, px_height) = (decoded.width(), decoded.height());
    if px_width == 0 || px_height == 0 {
        return Err(ConversionFailure::CorruptImage("image has no pixels".into()));
    }

    let rgb = flatten_alpha(decoded);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ConversionFailure::RenderFailed(e.to_string()))?;

    let (page_width, page_height) = page_dimensions(px_width, px_height, options.image_dpi);
    let mut builder = PdfBuilder::new().title(attachment.filename.clone());
    builder
        .add_image_page(jpeg, px_width, px_height, page_width, page_height)
        .map_err(|e| ConversionFailure::RenderFailed(e.to_string()))?;
    let bytes = builder
        .finish(options.page_size)
        .map_err(|e| ConversionFailure::RenderFailed(e.to_string()))?;

    Ok(Artifact {
        bytes,
        page_count: 1,
    })
}

/// Page size in points for an image of the given pixel size.
///
/// Scales pixels at `dpi`, then shrinks uniformly if either edge exceeds the
/// largest page PDF allows.
pub fn page_dimensions(px_width: u32, px_height: u32, dpi: f32) -> (f32, f32) {
    let dpi = if dpi.is_finite() && dpi > 0.0 { dpi } else { 96.0 };
    let scale = 72.0 / dpi;
    let mut width = px_width as f32 * scale;
    let mut height = px_height as f32 * scale;

    let largest = width.max(height);
    if largest > MAX_PAGE_EDGE {
        let shrink = MAX_PAGE_EDGE / largest;
        width *= shrink;
        height *= shrink;
    }
    (width, height)
}

fn flatten_alpha(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
