//! Grayscale raster helpers shared by the detector and embedder
//! preprocessing paths.

/// Sample a grayscale raster at a fractional position with bilinear
/// filtering, clamping coordinates to the image bounds.
pub(crate) fn sample_bilinear(src: &[u8], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x0 = (x.floor() as i64).clamp(0, width as i64 - 1) as usize;
    let y0 = (y.floor() as i64).clamp(0, height as i64 - 1) as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = (x - x.floor()).clamp(0.0, 1.0);
    let fy = (y - y.floor()).clamp(0.0, 1.0);

    let tl = src[y0 * width + x0] as f32;
    let tr = src[y0 * width + x1] as f32;
    let bl = src[y1 * width + x0] as f32;
    let br = src[y1 * width + x1] as f32;

    tl * (1.0 - fx) * (1.0 - fy) + tr * fx * (1.0 - fy) + bl * (1.0 - fx) * fy + br * fx * fy
}

/// Resize a whole grayscale image to `dst_w` x `dst_h` with bilinear
/// filtering, using pixel-center alignment.
pub(crate) fn resize(
    src: &[u8],
    width: usize,
    height: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let scale_x = width as f32 / dst_w as f32;
    let scale_y = height as f32 / dst_h as f32;

    let mut out = vec![0u8; dst_w * dst_h];
    for y in 0..dst_h {
        let src_y = (y as f32 + 0.5) * scale_y - 0.5;
        for x in 0..dst_w {
            let src_x = (x as f32 + 0.5) * scale_x - 0.5;
            let val = sample_bilinear(src, width, height, src_x, src_y);
            out[y * dst_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Resample an axis-aligned region `[x0, x1) x [y0, y1)` of a grayscale
/// image into a square `dst_size` x `dst_size` buffer. Region
/// coordinates may be fractional and are clamped at the image edges
/// during sampling.
pub(crate) fn resize_region(
    src: &[u8],
    width: usize,
    height: usize,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    dst_size: usize,
) -> Vec<u8> {
    let region_w = (x1 - x0).max(1.0);
    let region_h = (y1 - y0).max(1.0);
    let scale_x = region_w / dst_size as f32;
    let scale_y = region_h / dst_size as f32;

    let mut out = vec![0u8; dst_size * dst_size];
    for y in 0..dst_size {
        let src_y = y0 + (y as f32 + 0.5) * scale_y - 0.5;
        for x in 0..dst_size {
            let src_x = x0 + (x as f32 + 0.5) * scale_x - 0.5;
            let val = sample_bilinear(src, width, height, src_x, src_y);
            out[y * dst_size + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let src = vec![128u8; 100 * 100];
        let out = resize(&src, 100, 100, 200, 200);
        assert!(out.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_resize_identity_size() {
        let src: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
        let out = resize(&src, 8, 8, 8, 8);
        assert_eq!(out, src);
    }

    #[test]
    fn test_resize_region_picks_right_area() {
        // Left half black, right half white; cropping the right half
        // must yield a bright patch.
        let w = 20usize;
        let h = 10usize;
        let mut src = vec![0u8; w * h];
        for y in 0..h {
            for x in 10..w {
                src[y * w + x] = 255;
            }
        }

        let out = resize_region(&src, w, h, 10.0, 0.0, 20.0, 10.0, 4);
        let mean = out.iter().map(|&p| p as f32).sum::<f32>() / out.len() as f32;
        assert!(mean > 200.0, "expected bright crop, mean={mean}");
    }

    #[test]
    fn test_resize_region_out_of_bounds_clamps() {
        let src = vec![50u8; 10 * 10];
        // Region extends past the image; edge clamping keeps it uniform.
        let out = resize_region(&src, 10, 10, -5.0, -5.0, 15.0, 15.0, 8);
        assert!(out.iter().all(|&p| p == 50));
    }

    #[test]
    fn test_sample_bilinear_midpoint() {
        // 2x1 image [0, 255]; midpoint samples halfway.
        let src = vec![0u8, 255u8];
        let val = sample_bilinear(&src, 2, 1, 0.5, 0.0);
        assert!((val - 127.5).abs() < 1e-3);
    }
}
