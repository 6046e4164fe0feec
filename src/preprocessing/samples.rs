//! Raw 8-bit sample access shared by the per-channel filters.

use image::DynamicImage;

/// Normalises to one of the four 8-bit layouts the filters operate on,
/// keeping the channel count (and alpha) of the input.
pub(crate) fn to_eight_bit(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image.clone(),
        other => match (other.color().channel_count(), other.color().has_alpha()) {
            (1, _) => DynamicImage::ImageLuma8(other.to_luma8()),
            (2, _) => DynamicImage::ImageLumaA8(other.to_luma_alpha8()),
            (_, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
            _ => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
    }
}

/// Runs `f(src, dst, width, height, channels)` over interleaved 8-bit samples
/// and returns `dst` wrapped in the same layout as the (normalised) input.
///
/// `dst` starts as a copy of `src`.
pub(crate) fn map_samples<F>(image: &DynamicImage, mut f: F) -> DynamicImage
where
    F: FnMut(&[u8], &mut [u8], u32, u32, usize),
{
    let (width, height) = (image.width(), image.height());
    match to_eight_bit(image) {
        DynamicImage::ImageLuma8(src) => {
            let mut dst = src.clone();
            f(&src, &mut dst, width, height, 1);
            DynamicImage::ImageLuma8(dst)
        }
        DynamicImage::ImageLumaA8(src) => {
            let mut dst = src.clone();
            f(&src, &mut dst, width, height, 2);
            DynamicImage::ImageLumaA8(dst)
        }
        DynamicImage::ImageRgba8(src) => {
            let mut dst = src.clone();
            f(&src, &mut dst, width, height, 4);
            DynamicImage::ImageRgba8(dst)
        }
        other => {
            let src = other.to_rgb8();
            let mut dst = src.clone();
            f(&src, &mut dst, width, height, 3);
            DynamicImage::ImageRgb8(dst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, ImageBuffer, Luma, Rgba};

    #[test]
    fn test_to_eight_bit_keeps_channel_count() {
        let gray16 = DynamicImage::ImageLuma16(ImageBuffer::from_pixel(2, 2, Luma([1000u16])));
        assert_eq!(to_eight_bit(&gray16).color(), ColorType::L8);

        let rgba16 = DynamicImage::ImageRgba16(ImageBuffer::from_pixel(2, 2, Rgba([0u16, 0, 0, 65535])));
        assert_eq!(to_eight_bit(&rgba16).color(), ColorType::Rgba8);
    }

    #[test]
    fn test_map_samples_sees_interleaved_channels() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(3, 1, Rgba([1, 2, 3, 4])));
        let out = map_samples(&img, |src, dst, w, h, c| {
            assert_eq!((w, h, c), (3, 1, 4));
            assert_eq!(src.len(), 12);
            dst[0] = 9;
        });
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0, [9, 2, 3, 4]);
    }
}
