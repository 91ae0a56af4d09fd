use image::DynamicImage;
use image::imageops::FilterType;

/// Dimensions an image of `width x height` takes after bounding its larger side by `max_dimension`.
///
/// Returns `None` when both sides are strictly below the bound (no upscaling).
/// A side exactly equal to the bound still counts as oversized. The bound side
/// becomes `max_dimension` and the other side is truncated, not rounded.
pub fn resized_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    if width < max_dimension && height < max_dimension {
        return None;
    }
    if width == 0 || height == 0 {
        return None;
    }

    let aspect_ratio = width as f32 / height as f32;
    let (new_width, new_height) = if height > width {
        let scaled = (max_dimension as f32 * aspect_ratio) as u32;
        (scaled, max_dimension)
    } else {
        let scaled = (max_dimension as f32 / aspect_ratio) as u32;
        (max_dimension, scaled)
    };

    // Extreme aspect ratios truncate to zero; keep at least one pixel row/column.
    Some((new_width.max(1), new_height.max(1)))
}

/// Aspect-preserving downscale so the larger side is at most `max_dimension`.
///
/// Images whose sides are both strictly smaller than the bound come back untouched.
/// A zero bound is treated as "no bound".
pub fn resize_to_max_dimension(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    downscaled(&image, max_dimension).unwrap_or(image)
}

/// Borrowing form of [`resize_to_max_dimension`]: `None` when no resize is needed.
pub fn downscaled(image: &DynamicImage, max_dimension: u32) -> Option<DynamicImage> {
    if max_dimension == 0 {
        log::warn!("resize requested with a zero bound; leaving image as-is");
        return None;
    }

    let (width, height) = resized_dimensions(image.width(), image.height(), max_dimension)?;
    log::debug!(
        "resizing {}x{} -> {}x{} (bound {})",
        image.width(),
        image.height(),
        width,
        height,
        max_dimension
    );
    // Bilinear, matching a filtered scale.
    Some(image.resize_exact(width, height, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portrait_binds_height() {
        assert_eq!(resized_dimensions(1000, 2000, 800), Some((400, 800)));
    }

    #[test]
    fn square_binds_width() {
        assert_eq!(resized_dimensions(900, 900, 800), Some((800, 800)));
    }

    #[test]
    fn truncates_instead_of_rounding() {
        // 800 / 1.50075 = 533.07
        assert_eq!(resized_dimensions(3000, 1999, 800), Some((800, 533)));
    }

    #[test]
    fn degenerate_aspect_keeps_one_pixel() {
        assert_eq!(resized_dimensions(10_000, 1, 800), Some((800, 1)));
    }

    #[test]
    fn downscaled_only_allocates_when_needed() {
        let small = DynamicImage::new_rgb8(40, 20);
        assert!(downscaled(&small, 80).is_none());
        assert!(downscaled(&small, 0).is_none());

        let large = DynamicImage::new_rgb8(200, 100);
        let resized = downscaled(&large, 80).expect("oversized image is resized");
        assert_eq!((resized.width(), resized.height()), (80, 40));
        // The source is borrowed, not consumed
        assert_eq!(large.width(), 200);
    }
}
