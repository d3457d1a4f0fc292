use std::collections::HashMap;
use std::path::Path;

use image::{DynamicImage, GrayImage, Luma, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use crate::{DetectError, Detection, Detector};

const BOX_COLOR: Rgb<u8> = Rgb([220, 20, 60]);

/// Classical-CV object detector: grayscale, Gaussian blur, Canny edges,
/// connected-component grouping, then a shape label per surviving region.
pub struct ContourDetector {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Regions with fewer edge pixels than this are noise.
    pub min_area: u32,
    pub max_detections: usize,
}

impl Default for ContourDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            canny_low: 50.0,
            canny_high: 100.0,
            min_area: 20,
            max_detections: 64,
        }
    }
}

impl Detector for ContourDetector {
    fn detect(&self, path: &Path) -> Result<Detection, DetectError> {
        let img = image::open(path)?;

        let gray = img.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.blur_sigma);
        let edges = canny(&blurred, self.canny_low, self.canny_high);

        let mut regions = find_regions(&edges, self.min_area);
        regions.sort_by(|a, b| {
            b.pixel_count
                .cmp(&a.pixel_count)
                .then(a.min_x.cmp(&b.min_x))
        });
        regions.truncate(self.max_detections);

        debug!("{} regions survived filtering", regions.len());

        let mut annotated = img.to_rgb8();
        for region in &regions {
            draw_hollow_rect_mut(&mut annotated, region.rect(), BOX_COLOR);
        }

        let labels = regions.iter().map(|r| r.label().to_string()).collect();

        Ok(Detection {
            labels,
            annotated: DynamicImage::ImageRgb8(annotated),
        })
    }
}

/// One connected edge region, tracked by its bounding box.
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixel_count: u32,
}

impl Region {
    fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    fn aspect_ratio(&self) -> f32 {
        let h = self.height() as f32;
        if h == 0.0 {
            return 0.0;
        }
        self.width() as f32 / h
    }

    /// Fraction of the bounding box covered by edge pixels. An outline of a
    /// compact shape covers little of its box; a dense texture covers a lot.
    fn fill_ratio(&self) -> f32 {
        self.pixel_count as f32 / (self.width() * self.height()) as f32
    }

    fn rect(&self) -> Rect {
        Rect::at(self.min_x as i32, self.min_y as i32).of_size(self.width(), self.height())
    }

    fn label(&self) -> &'static str {
        let aspect = self.aspect_ratio();
        if !(0.4..=2.5).contains(&aspect) {
            "bar"
        } else if self.fill_ratio() < 0.25 {
            "box"
        } else {
            "blob"
        }
    }
}

/// Group edge pixels into connected regions, dropping those below `min_area`.
fn find_regions(edges: &GrayImage, min_area: u32) -> Vec<Region> {
    let labeled = connected_components(edges, Connectivity::Eight, Luma([0u8]));

    let mut regions: HashMap<u32, Region> = HashMap::new();
    for (x, y, label) in labeled.enumerate_pixels() {
        let label_val = label[0];
        if label_val == 0 {
            continue; // background
        }

        regions
            .entry(label_val)
            .and_modify(|r| {
                r.min_x = r.min_x.min(x);
                r.min_y = r.min_y.min(y);
                r.max_x = r.max_x.max(x);
                r.max_y = r.max_y.max(y);
                r.pixel_count += 1;
            })
            .or_insert(Region {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
                pixel_count: 1,
            });
    }

    regions
        .into_values()
        .filter(|r| r.pixel_count >= min_area)
        .collect()
}
