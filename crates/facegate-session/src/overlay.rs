//! Debug overlay snapshots.
//!
//! Renders the detected bounding box and landmarks over the captured
//! frame and writes one PNG per scan attempt. Purely presentational;
//! failures here never affect a scan.

use facegate_core::BoundingBox;
use facegate_hw::Frame;
use image::{Rgb, RgbImage};
use std::path::PathBuf;

const BOX_COLOR: Rgb<u8> = Rgb([64, 255, 64]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 64, 64]);
const LANDMARK_RADIUS: i64 = 2;

/// Writes numbered annotated snapshots into a directory.
pub struct SnapshotWriter {
    dir: PathBuf,
    counter: u32,
}

impl SnapshotWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, counter: 0 }
    }

    /// Annotate `frame` with `face` and write it as the next snapshot.
    pub fn write(&mut self, frame: &Frame, face: &BoundingBox) -> Result<PathBuf, SnapshotError> {
        std::fs::create_dir_all(&self.dir)?;

        let img = annotate(frame, face);
        self.counter += 1;
        let path = self.dir.join(format!("scan-{:04}.png", self.counter));
        img.save(&path)?;
        tracing::debug!(path = %path.display(), "wrote debug snapshot");
        Ok(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Render the grayscale frame as RGB with the detection drawn on top.
pub fn annotate(frame: &Frame, face: &BoundingBox) -> RgbImage {
    let mut img = RgbImage::from_fn(frame.width, frame.height, |x, y| {
        let p = frame.data[(y * frame.width + x) as usize];
        Rgb([p, p, p])
    });

    draw_rect(&mut img, face);
    if let Some(landmarks) = &face.landmarks {
        for &(lx, ly) in landmarks {
            draw_dot(&mut img, lx, ly);
        }
    }

    img
}

/// One-pixel rectangle outline, clipped to the image.
fn draw_rect(img: &mut RgbImage, face: &BoundingBox) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = face.x.round() as i64;
    let y0 = face.y.round() as i64;
    let x1 = (face.x + face.width).round() as i64;
    let y1 = (face.y + face.height).round() as i64;

    let mut put = |x: i64, y: i64| {
        if (0..w).contains(&x) && (0..h).contains(&y) {
            img.put_pixel(x as u32, y as u32, BOX_COLOR);
        }
    };

    for x in x0..=x1 {
        put(x, y0);
        put(x, y1);
    }
    for y in y0..=y1 {
        put(x0, y);
        put(x1, y);
    }
}

/// Filled square dot centered on a landmark.
fn draw_dot(img: &mut RgbImage, cx: f32, cy: f32) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let cx = cx.round() as i64;
    let cy = cy.round() as i64;

    for dy in -LANDMARK_RADIUS..=LANDMARK_RADIUS {
        for dx in -LANDMARK_RADIUS..=LANDMARK_RADIUS {
            let (x, y) = (cx + dx, cy + dy);
            if (0..w).contains(&x) && (0..h).contains(&y) {
                img.put_pixel(x as u32, y as u32, LANDMARK_COLOR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, fill: u8) -> Frame {
        Frame {
            data: vec![fill; (width * height) as usize],
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 0,
            is_dark: false,
        }
    }

    #[test]
    fn test_annotate_draws_box_edges() {
        let frame = gray_frame(100, 100, 50);
        let face = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            confidence: 0.9,
            landmarks: None,
        };

        let img = annotate(&frame, &face);
        assert_eq!(*img.get_pixel(10, 20), BOX_COLOR); // top-left corner
        assert_eq!(*img.get_pixel(40, 60), BOX_COLOR); // bottom-right corner
        assert_eq!(*img.get_pixel(25, 20), BOX_COLOR); // top edge
        assert_eq!(*img.get_pixel(50, 50), Rgb([50, 50, 50])); // outside
    }

    #[test]
    fn test_annotate_draws_landmarks() {
        let frame = gray_frame(100, 100, 0);
        let face = BoundingBox {
            x: 10.0,
            y: 10.0,
            width: 60.0,
            height: 60.0,
            confidence: 0.9,
            landmarks: Some([(30.0, 30.0), (50.0, 30.0), (40.0, 40.0), (32.0, 52.0), (48.0, 52.0)]),
        };

        let img = annotate(&frame, &face);
        assert_eq!(*img.get_pixel(30, 30), LANDMARK_COLOR);
        assert_eq!(*img.get_pixel(48, 52), LANDMARK_COLOR);
    }

    #[test]
    fn test_annotate_clips_out_of_bounds_box() {
        let frame = gray_frame(50, 50, 0);
        let face = BoundingBox {
            x: -10.0,
            y: -10.0,
            width: 100.0,
            height: 100.0,
            confidence: 0.9,
            landmarks: Some([(-5.0, -5.0), (60.0, 60.0), (25.0, 25.0), (0.0, 49.0), (49.0, 0.0)]),
        };

        // Must not panic; interior landmark still lands.
        let img = annotate(&frame, &face);
        assert_eq!(*img.get_pixel(25, 25), LANDMARK_COLOR);
    }

    #[test]
    fn test_snapshot_writer_numbers_files() {
        let dir = std::env::temp_dir().join(format!("facegate-overlay-test-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut writer = SnapshotWriter::new(dir.clone());
        let frame = gray_frame(32, 32, 100);
        let face = BoundingBox {
            x: 4.0,
            y: 4.0,
            width: 20.0,
            height: 20.0,
            confidence: 0.5,
            landmarks: None,
        };

        let first = writer.write(&frame, &face).unwrap();
        let second = writer.write(&frame, &face).unwrap();
        assert!(first.ends_with("scan-0001.png"));
        assert!(second.ends_with("scan-0002.png"));
        assert!(first.exists() && second.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
