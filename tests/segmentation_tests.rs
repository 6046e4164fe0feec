//! # Segmentation Tests
//!
//! Ordering, bounds and size filtering of detected regions on synthetic masks.

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    use page_segmenter::{get_segment, BoundingBox, SegmentOptions};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CELL: u32 = 20;

    fn paint(mask: &mut GrayImage, rect: &BoundingBox) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    /// Disjoint rectangles, at most one per grid cell; cells in the first row
    /// and column may place theirs against the image border
    fn random_layout(rng: &mut StdRng, cols: u32, rows: u32) -> Vec<BoundingBox> {
        let mut rects = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                if !rng.random_bool(0.6) {
                    continue;
                }
                let width = rng.random_range(1..CELL - 4);
                let height = rng.random_range(1..CELL - 4);
                let x = col * CELL + rng.random_range(0..CELL - 1 - width);
                let y = row * CELL + rng.random_range(0..CELL - 1 - height);
                rects.push(BoundingBox { x, y, width, height });
            }
        }
        rects
    }

    fn mask_of(width: u32, height: u32, rects: &[BoundingBox]) -> DynamicImage {
        let mut mask = GrayImage::new(width, height);
        for rect in rects {
            paint(&mut mask, rect);
        }
        DynamicImage::ImageLuma8(mask)
    }

    /// Every region is in bounds, sorted by x + y, and matches a painted rectangle
    #[test]
    fn test_random_layouts_order_and_bounds() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..20 {
            let (cols, rows) = (6, 4);
            let (width, height) = (cols * CELL, rows * CELL);
            let rects = random_layout(&mut rng, cols, rows);
            let mask = mask_of(width, height, &rects);
            let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));

            let result = get_segment(&mask, &source, &SegmentOptions::default()).unwrap();
            assert_eq!(result.contours_detected, rects.len());
            assert_eq!(result.regions.len(), rects.len());

            for pair in result.regions.windows(2) {
                assert!(pair[0].bbox.sort_key() <= pair[1].bbox.sort_key());
            }
            for region in &result.regions {
                let b = region.bbox;
                assert!(b.width > 0 && b.height > 0);
                assert!(b.x + b.width <= width);
                assert!(b.y + b.height <= height);
                assert!(rects.contains(&b));
                assert_eq!((region.pixels.width(), region.pixels.height()), (b.width, b.height));
            }
        }
    }

    /// Heights 10, 20, 30 with a height threshold of 20 keep only the tallest
    #[test]
    fn test_height_threshold_is_strict() {
        let rects = [
            BoundingBox { x: 5, y: 5, width: 8, height: 10 },
            BoundingBox { x: 30, y: 5, width: 8, height: 20 },
            BoundingBox { x: 60, y: 5, width: 8, height: 30 },
        ];
        let mask = mask_of(80, 40, &rects);
        let options = SegmentOptions {
            height_thresh: 20.0,
            width_thresh: 0.0,
            use_average_thresh: false,
        };
        let result = get_segment(&mask, &mask, &options).unwrap();
        assert_eq!(result.contours_detected, 3);
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].bbox, rects[2]);
    }

    /// Average mode replaces both thresholds with the mean contour size
    #[test]
    fn test_average_thresholds() {
        let rects = [
            BoundingBox { x: 2, y: 2, width: 4, height: 10 },
            BoundingBox { x: 20, y: 2, width: 8, height: 20 },
            BoundingBox { x: 40, y: 2, width: 12, height: 30 },
        ];
        let mask = mask_of(60, 40, &rects);
        let options = SegmentOptions {
            height_thresh: 1000.0,
            width_thresh: 1000.0,
            use_average_thresh: true,
        };
        let result = get_segment(&mask, &mask, &options).unwrap();
        assert_eq!(result.height_threshold, 20.0);
        assert_eq!(result.width_threshold, 8.0);
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].bbox, rects[2]);
    }

    /// In average mode a height equal to the mean is dropped and one above it is kept
    #[test]
    fn test_average_threshold_is_strict() {
        // Mean height (10 + 20 + 30 + 21 + 19) / 5 = 20, mean width 45 / 5 = 9
        let rects = [
            BoundingBox { x: 2, y: 2, width: 10, height: 10 },
            BoundingBox { x: 22, y: 2, width: 10, height: 20 },
            BoundingBox { x: 42, y: 2, width: 10, height: 30 },
            BoundingBox { x: 62, y: 2, width: 10, height: 21 },
            BoundingBox { x: 82, y: 2, width: 5, height: 19 },
        ];
        let mask = mask_of(100, 40, &rects);
        let options = SegmentOptions {
            height_thresh: 0.0,
            width_thresh: 0.0,
            use_average_thresh: true,
        };
        let result = get_segment(&mask, &mask, &options).unwrap();
        assert_eq!(result.height_threshold, 20.0);
        assert_eq!(result.width_threshold, 9.0);

        let kept: Vec<BoundingBox> = result.regions.iter().map(|r| r.bbox).collect();
        assert_eq!(kept, vec![rects[2], rects[3]]);
    }

    /// Blocks against each edge keep their exact boxes
    #[test]
    fn test_blocks_on_every_edge() {
        let (width, height) = (40, 30);
        let rects = [
            BoundingBox { x: 0, y: 0, width: 3, height: 3 },
            BoundingBox { x: 15, y: 0, width: 6, height: 4 },
            BoundingBox { x: 0, y: 12, width: 5, height: 6 },
            BoundingBox { x: 34, y: 10, width: 6, height: 5 },
            BoundingBox { x: 18, y: 26, width: 7, height: 4 },
            BoundingBox { x: 36, y: 27, width: 4, height: 3 },
        ];
        let mask = mask_of(width, height, &rects);
        let result = get_segment(&mask, &mask, &SegmentOptions::default()).unwrap();
        assert_eq!(result.contours_detected, rects.len());

        let mut found: Vec<BoundingBox> = result.regions.iter().map(|r| r.bbox).collect();
        let mut expected = rects.to_vec();
        found.sort_by_key(|b| (b.x, b.y));
        expected.sort_by_key(|b| (b.x, b.y));
        assert_eq!(found, expected);
    }

    /// An all-foreground mask is a single region covering the image
    #[test]
    fn test_full_mask() {
        let mask = DynamicImage::ImageLuma8(GrayImage::from_pixel(25, 15, Luma([255])));
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(25, 15, Rgb([9, 9, 9])));
        let result = get_segment(&mask, &source, &SegmentOptions::default()).unwrap();
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].bbox, BoundingBox { x: 0, y: 0, width: 25, height: 15 });
        assert_eq!(result.regions[0].pixels, source);
    }

    /// Crops carry the source pixels, not the mask pixels
    #[test]
    fn test_crops_come_from_source() {
        let rect = BoundingBox { x: 3, y: 4, width: 5, height: 6 };
        let mask = mask_of(20, 20, &[rect]);
        let source = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 20, |x, y| Rgb([x as u8, y as u8, 7])));

        let result = get_segment(&mask, &source, &SegmentOptions::default()).unwrap();
        let crop = result.regions[0].pixels.to_rgb8();
        assert_eq!(crop.get_pixel(0, 0).0, [3, 4, 7]);
        assert_eq!(crop.get_pixel(4, 5).0, [7, 9, 7]);
    }

    /// A blank mask yields no regions and an unmodified annotated copy
    #[test]
    fn test_blank_mask() {
        let mask = DynamicImage::ImageLuma8(GrayImage::new(30, 30));
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 30, Rgb([1, 2, 3])));
        let result = get_segment(&mask, &source, &SegmentOptions::default()).unwrap();
        assert!(result.regions.is_empty());
        assert_eq!(result.annotated, source);
    }
}
