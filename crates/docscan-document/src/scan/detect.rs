// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document detection. Finds the outline of a sheet of paper in a photo so it
// can be warped flat, and locates likely text blocks on a flattened page.

use docscan_core::config::DetectionConfig;
use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, contour_area};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use imageproc::morphology::{close, dilate};
use imageproc::point::Point;
use tracing::{debug, instrument, warn};

/// How many of the largest contours are tested for a four-sided outline.
const CANDIDATE_CONTOURS: usize = 5;

/// Douglas-Peucker tolerance as a fraction of the contour perimeter.
const APPROX_EPSILON_RATIO: f64 = 0.02;

/// Tuning for [`edge_map`] and [`find_document_quad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Side of the Gaussian kernel applied before Canny (odd).
    pub blur_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Side of the square dilation kernel.
    pub dilate_kernel: u32,
    pub dilate_iterations: u32,
    /// Smallest accepted quad, as a fraction of the image area.
    pub min_area_ratio: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self::from(&DetectionConfig::default())
    }
}

impl From<&DetectionConfig> for DetectionParams {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            blur_kernel: config.blur_kernel,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            dilate_kernel: config.dilate_kernel,
            dilate_iterations: config.dilate_iterations,
            min_area_ratio: config.min_area_ratio,
        }
    }
}

impl DetectionParams {
    /// Gaussian sigma equivalent to a `blur_kernel` x `blur_kernel` box,
    /// using the usual `0.3 * ((k - 1) / 2 - 1) + 0.8` rule.
    pub fn blur_sigma(&self) -> f32 {
        let k = self.blur_kernel.max(1) as f32;
        (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.1)
    }
}

/// Four document corners ordered top-left, top-right, bottom-right,
/// bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [(f32, f32); 4],
}

impl Quad {
    /// Build a quad from four points in any order.
    pub fn from_points(points: [(f32, f32); 4]) -> Self {
        Self {
            corners: order_corners(points),
        }
    }

    pub fn top_left(&self) -> (f32, f32) {
        self.corners[0]
    }

    pub fn top_right(&self) -> (f32, f32) {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> (f32, f32) {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> (f32, f32) {
        self.corners[3]
    }

    pub fn area(&self) -> f32 {
        shoelace_area(&self.corners)
    }

    /// Output size of the flattened document: the longer of each pair of
    /// opposite edges, truncated to whole pixels.
    pub fn target_size(&self) -> (u32, u32) {
        let [tl, tr, br, bl] = self.corners;
        let width = distance(br, bl).max(distance(tr, tl));
        let height = distance(tr, br).max(distance(tl, bl));
        (width as u32, height as u32)
    }
}

/// A bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Order four points as `[top_left, top_right, bottom_right, bottom_left]`.
///
/// The top-left corner has the smallest `x + y` and the bottom-right the
/// largest. The top-right has the smallest `y - x` and the bottom-left the
/// largest.
pub fn order_corners(points: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let by = |key: fn(&(f32, f32)) -> f32, largest: bool| -> (f32, f32) {
        let cmp = |a: &(f32, f32), b: &(f32, f32)| key(a).total_cmp(&key(b));
        let found = if largest {
            points.iter().copied().max_by(cmp)
        } else {
            points.iter().copied().min_by(cmp)
        };
        found.unwrap_or_default()
    };

    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;
    [
        by(sum, false),
        by(diff, false),
        by(sum, true),
        by(diff, true),
    ]
}

/// Grayscale, blur, Canny, then dilate to close small gaps in the outline.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn edge_map(image: &DynamicImage, params: &DetectionParams) -> GrayImage {
    let gray = image.to_luma8();
    let blurred = gaussian_blur_f32(&gray, params.blur_sigma());
    let mut edges = canny(&blurred, params.canny_low, params.canny_high);

    let radius = (params.dilate_kernel / 2).min(u8::MAX as u32) as u8;
    if radius > 0 {
        for _ in 0..params.dilate_iterations {
            edges = dilate(&edges, Norm::LInf, radius);
        }
    }
    edges
}

/// Locate the document outline in a photo.
///
/// The largest outer contours of the edge map are simplified with
/// Douglas-Peucker; the first that reduces to four vertices wins. When no
/// contour qualifies, dominant straight lines are tried instead. Quads
/// smaller than `min_area_ratio` of the image are rejected.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn find_document_quad(image: &DynamicImage, params: &DetectionParams) -> Option<Quad> {
    let (width, height) = (image.width(), image.height());
    if width < 3 || height < 3 {
        return None;
    }
    let min_area = width as f32 * height as f32 * params.min_area_ratio;
    let edges = edge_map(image, params);

    if let Some(quad) = find_quad_by_contours(&edges, min_area) {
        debug!(corners = ?quad.corners, "Document outline found from contours");
        return Some(quad);
    }

    match find_quad_by_lines(&edges) {
        Some(quad) if quad.area() >= min_area => {
            debug!(corners = ?quad.corners, "Document outline found from lines");
            Some(quad)
        }
        Some(quad) => {
            warn!(area = quad.area(), min_area, "Line-based outline too small");
            None
        }
        None => {
            debug!("No document outline found");
            None
        }
    }
}

fn find_quad_by_contours(edges: &GrayImage, min_area: f32) -> Option<Quad> {
    let mut outlines: Vec<(f64, Contour<i32>)> = find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| (contour_area(&c.points), c))
        .collect();
    outlines.sort_by(|a, b| b.0.total_cmp(&a.0));
    debug!(contours = outlines.len(), "Outer contours found");

    for (area, contour) in outlines.iter().take(CANDIDATE_CONTOURS) {
        let epsilon = APPROX_EPSILON_RATIO * arc_length(&contour.points, true);
        let approx = approximate_closed(&contour.points, epsilon);
        debug!(area, vertices = approx.len(), "Candidate contour");
        if approx.len() != 4 {
            continue;
        }
        let points = [0, 1, 2, 3].map(|i| (approx[i].x as f32, approx[i].y as f32));
        let quad = Quad::from_points(points);
        if quad.area() < min_area {
            debug!(area = quad.area(), min_area, "Four-sided contour too small");
            return None;
        }
        return Some(quad);
    }
    None
}

/// Douglas-Peucker on a closed curve. The curve is split at the point
/// farthest from its start and each half is simplified as an open chain, so
/// the start vertex never sits on a degenerate baseline.
fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }
    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let (dx, dy) = ((p.x - start.x) as i64, (p.y - start.y) as i64);
            dx * dx + dy * dy
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut first = approximate_polygon_dp(&points[..=far], epsilon, false);
    let mut back: Vec<Point<i32>> = points[far..].to_vec();
    back.push(start);
    let mut second = approximate_polygon_dp(&back, epsilon, false);

    // `far` starts the second chain and `start` ends it.
    first.pop();
    second.pop();
    first.append(&mut second);
    first
}

/// Quadrilateral from the outermost dominant horizontal and vertical lines.
pub fn find_quad_by_lines(edges: &GrayImage) -> Option<Quad> {
    let (width, height) = edges.dimensions();
    let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    let vote_threshold = (diagonal * 0.25).max(80.0) as u32;
    let lines = detect_lines(
        edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    );
    debug!(lines = lines.len(), vote_threshold, "Hough lines detected");

    let (horizontal, vertical) = classify_lines(&lines);
    if horizontal.len() < 2 || vertical.len() < 2 {
        return None;
    }

    let mid_x = width as f32 / 2.0;
    let mid_y = height as f32 / 2.0;
    let y_at_mid = |l: &PolarLine| y_intercept(l, mid_x);
    let x_at_mid = |l: &PolarLine| x_intercept(l, mid_y);

    let top = extreme(&horizontal, y_at_mid, false)?;
    let bottom = extreme(&horizontal, y_at_mid, true)?;
    let left = extreme(&vertical, x_at_mid, false)?;
    let right = extreme(&vertical, x_at_mid, true)?;

    let corners = [
        intersect_polar_lines(&top, &left)?,
        intersect_polar_lines(&top, &right)?,
        intersect_polar_lines(&bottom, &right)?,
        intersect_polar_lines(&bottom, &left)?,
    ];
    Some(Quad::from_points(corners))
}

/// Likely text blocks on a flattened page.
///
/// Ink (at or below the Otsu level) is masked, nearby strokes are joined
/// with a 3x3 closing, and the bounding box of each outer contour is kept
/// when it is wider than 20 px, taller than 10 px, and narrower than 80% of
/// the page.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn detect_text_regions(image: &DynamicImage) -> Vec<Region> {
    let gray = image.to_luma8();
    let ink = threshold(&gray, otsu_level(&gray), ThresholdType::BinaryInverted);
    let joined = close(&ink, Norm::LInf, 1);

    let max_width = gray.width() as f32 * 0.8;
    let regions: Vec<Region> = find_contours::<i32>(&joined)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| bounding_box(&c.points))
        .filter(|r| r.width > 20 && r.height > 10 && (r.width as f32) < max_width)
        .collect();

    debug!(regions = regions.len(), "Text regions detected");
    regions
}

// -- Geometry helpers ---------------------------------------------------------

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn bounding_box(points: &[Point<i32>]) -> Option<Region> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(Region {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Shoelace area of an ordered quadrilateral.
fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let mut area = 0.0f32;
    for i in 0..4 {
        let j = (i + 1) % 4;
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}

// -- Hough line helpers -------------------------------------------------------
//
// A `PolarLine` is `x * cos(theta) + y * sin(theta) = r`, so theta near 90
// degrees is a horizontal line and theta near 0 or 180 is a vertical one.

fn classify_lines(lines: &[PolarLine]) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for line in lines {
        let angle = line.angle_in_degrees;
        if (60..=120).contains(&angle) {
            horizontal.push(*line);
        } else if angle <= 30 || angle >= 150 {
            vertical.push(*line);
        }
    }
    (horizontal, vertical)
}

fn extreme(lines: &[PolarLine], position: impl Fn(&PolarLine) -> f32, largest: bool) -> Option<PolarLine> {
    let cmp = |a: &&PolarLine, b: &&PolarLine| position(a).total_cmp(&position(b));
    let found = if largest {
        lines.iter().max_by(cmp)
    } else {
        lines.iter().min_by(cmp)
    };
    found.copied()
}

/// `y` where a near-horizontal line crosses `x`.
fn y_intercept(line: &PolarLine, x: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - x * theta.cos()) / theta.sin()
}

/// `x` where a near-vertical line crosses `y`.
fn x_intercept(line: &PolarLine, y: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - y * theta.sin()) / theta.cos()
}

/// Returns `None` for (nearly) parallel lines.
fn intersect_polar_lines(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let theta_a = (a.angle_in_degrees as f64).to_radians();
    let theta_b = (b.angle_in_degrees as f64).to_radians();
    let (sin_a, cos_a) = theta_a.sin_cos();
    let (sin_b, cos_b) = theta_b.sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (a.r as f64, b.r as f64);
    let x = (r_a * sin_b - r_b * sin_a) / denom;
    let y = (r_b * cos_a - r_a * cos_b) / denom;
    Some((x as f32, y as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Light page on a dark desk.
    fn page_on_desk(w: u32, h: u32, page: (u32, u32, u32, u32)) -> DynamicImage {
        let (x0, y0, x1, y1) = page;
        let img = GrayImage::from_fn(w, h, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([235u8])
            } else {
                Luma([25u8])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn corners_are_ordered_from_any_input_order() {
        let ordered = order_corners([(90.0, 80.0), (10.0, 5.0), (12.0, 85.0), (95.0, 8.0)]);
        assert_eq!(
            ordered,
            [(10.0, 5.0), (95.0, 8.0), (90.0, 80.0), (12.0, 85.0)]
        );
    }

    #[test]
    fn target_size_takes_the_longer_edges() {
        let quad = Quad::from_points([(0.0, 0.0), (100.0, 0.0), (110.0, 50.0), (0.0, 50.0)]);
        let (w, h) = quad.target_size();
        assert_eq!(w, 110);
        assert_eq!(h, 50);
    }

    #[test]
    fn blur_sigma_matches_kernel_rule() {
        let params = DetectionParams::default();
        assert_eq!(params.blur_kernel, 5);
        assert!((params.blur_sigma() - 1.1).abs() < 1e-4);
    }

    #[test]
    fn finds_a_bright_page_on_a_dark_background() {
        let image = page_on_desk(400, 500, (50, 60, 350, 440));
        let quad = find_document_quad(&image, &DetectionParams::default())
            .expect("page outline should be found");

        let expected = [(50.0, 60.0), (350.0, 60.0), (350.0, 440.0), (50.0, 440.0)];
        for (found, want) in quad.corners.iter().zip(expected) {
            assert!(
                (found.0 - want.0).abs() <= 6.0 && (found.1 - want.1).abs() <= 6.0,
                "corner {found:?} too far from {want:?}"
            );
        }
    }

    #[test]
    fn blank_image_has_no_document() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([128u8])));
        assert!(find_document_quad(&image, &DetectionParams::default()).is_none());
    }

    #[test]
    fn small_page_is_rejected() {
        // 40x40 on 400x400 is 1% of the image.
        let image = page_on_desk(400, 400, (100, 100, 140, 140));
        assert!(find_document_quad(&image, &DetectionParams::default()).is_none());
    }

    #[test]
    fn text_blocks_are_boxed() {
        let mut img = GrayImage::from_pixel(300, 200, Luma([250u8]));
        // A 60x16 "word" and a speck that is too small to count.
        for y in 50..66 {
            for x in 40..100 {
                img.put_pixel(x, y, Luma([10u8]));
            }
        }
        for y in 150..154 {
            for x in 200..204 {
                img.put_pixel(x, y, Luma([10u8]));
            }
        }

        let regions = detect_text_regions(&DynamicImage::ImageLuma8(img));
        assert_eq!(
            regions,
            vec![Region {
                x: 40,
                y: 50,
                width: 60,
                height: 16
            }]
        );
    }

    #[test]
    fn full_width_banner_is_not_text() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([250u8]));
        for y in 10..30 {
            for x in 5..95 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
        assert!(detect_text_regions(&DynamicImage::ImageLuma8(img)).is_empty());
    }

    #[test]
    fn perpendicular_lines_intersect() {
        let horizontal = PolarLine {
            r: 100.0,
            angle_in_degrees: 90,
        };
        let vertical = PolarLine {
            r: 50.0,
            angle_in_degrees: 0,
        };
        let (x, y) = intersect_polar_lines(&horizontal, &vertical).unwrap();
        assert!((x - 50.0).abs() < 0.5 && (y - 100.0).abs() < 0.5);
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        let a = PolarLine {
            r: 50.0,
            angle_in_degrees: 0,
        };
        let b = PolarLine {
            r: 100.0,
            angle_in_degrees: 0,
        };
        assert!(intersect_polar_lines(&a, &b).is_none());
    }

    #[test]
    fn lines_are_classified_by_angle() {
        let lines = [0, 5, 90, 85, 45, 170].map(|angle_in_degrees| PolarLine {
            r: 10.0,
            angle_in_degrees,
        });
        let (horizontal, vertical) = classify_lines(&lines);
        assert_eq!(horizontal.len(), 2);
        assert_eq!(vertical.len(), 3);
    }

    #[test]
    fn square_contour_simplifies_to_four_points() {
        let mut points = Vec::new();
        for x in 0..50 {
            points.push(Point::new(x, 0));
        }
        for y in 0..50 {
            points.push(Point::new(50, y));
        }
        for x in (1..=50).rev() {
            points.push(Point::new(x, 50));
        }
        for y in (1..=50).rev() {
            points.push(Point::new(0, y));
        }
        let epsilon = 0.02 * arc_length(&points, true);
        let approx = approximate_closed(&points, epsilon);
        assert_eq!(approx.len(), 4);
        assert!((contour_area(&points) - 2500.0).abs() < 1.0);
    }
}
