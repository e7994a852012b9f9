use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use nalgebra::{Matrix2, Point2, Vector2};

use crate::dictionary::{Dictionary, Matcher};
use crate::geometry::{cross, Homography};
use crate::params::DetectorParams;
use crate::threshold::{adaptive_threshold_inv, mean_std, otsu_threshold};

/// One decoded marker
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerObservation {
    /// Marker id in the dictionary
    pub id: u32,
    /// Image-space corners, clockwise, starting at the marker's top-left
    pub corners: [Point2<f32>; 4],
}

/// Result of a detection pass
#[derive(Clone, Debug, Default)]
pub struct Detection {
    pub markers: Vec<MarkerObservation>,
    /// Quadrilateral candidates that did not decode to a marker
    pub rejected: Vec<[Point2<f32>; 4]>,
}

/// A quadrilateral that may be a marker
#[derive(Clone, Debug)]
struct Candidate {
    corners: [Point2<f32>; 4],
    /// Number of contour points the quad was fitted to
    perimeter: usize,
}

/// ArUco-style square marker detector for a single dictionary
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: DetectorParams,
    matcher: Matcher,
}

impl MarkerDetector {
    pub fn new(dict: Dictionary, params: DetectorParams) -> Self {
        let matcher = Matcher::with_correction_rate(dict, params.error_correction_rate);
        Self { params, matcher }
    }

    pub fn detect(&self, gray: &GrayImage) -> Detection {
        let candidates = self.find_candidates(gray);
        log::debug!("{} marker candidates", candidates.len());

        let mut detection = Detection::default();
        for candidate in candidates {
            match self.decode(gray, &candidate.corners) {
                Some(mut marker) => {
                    if self.params.corner_refinement {
                        for c in marker.corners.iter_mut() {
                            *c = refine_corner(gray, *c, &self.params);
                        }
                    }
                    detection.markers.push(marker);
                }
                None => detection.rejected.push(candidate.corners),
            }
        }

        log::debug!(
            "decoded {} markers {:?}, rejected {} candidates",
            detection.markers.len(),
            detection.markers.iter().map(|m| m.id).collect::<Vec<_>>(),
            detection.rejected.len()
        );
        detection
    }

    fn find_candidates(&self, gray: &GrayImage) -> Vec<Candidate> {
        let p = &self.params;
        let (width, height) = gray.dimensions();
        let longest = width.max(height) as f64;
        let min_perimeter = (p.min_marker_perimeter_rate * longest) as usize;
        let max_perimeter = (p.max_marker_perimeter_rate * longest) as usize;

        let mut candidates = Vec::new();
        for window in p.window_sizes() {
            let binary = adaptive_threshold_inv(gray, window, p.adaptive_thresh_constant);
            let contours = find_contours::<i32>(&binary);

            let before = candidates.len();
            for contour in contours {
                if !matches!(contour.border_type, BorderType::Outer) {
                    continue;
                }
                let len = contour.points.len();
                if len < min_perimeter.max(4) || len > max_perimeter {
                    continue;
                }
                let points: Vec<Point2<f32>> = contour
                    .points
                    .iter()
                    .map(|pt| Point2::new(pt.x as f32, pt.y as f32))
                    .collect();
                if let Some(corners) = self.fit_quad(&points, width, height) {
                    candidates.push(Candidate {
                        corners,
                        perimeter: len,
                    });
                }
            }
            log::trace!("window {window}: {} quads", candidates.len() - before);
        }

        self.drop_near_duplicates(candidates)
    }

    fn fit_quad(
        &self,
        contour: &[Point2<f32>],
        width: u32,
        height: u32,
    ) -> Option<[Point2<f32>; 4]> {
        let p = &self.params;
        let epsilon = contour.len() as f32 * p.polygonal_approx_accuracy_rate as f32;
        let poly = approximate_closed_polygon(contour, epsilon);
        if poly.len() != 4 {
            return None;
        }
        let mut quad = [poly[0], poly[1], poly[2], poly[3]];

        let turns: Vec<f32> = (0..4)
            .map(|i| cross(quad[i], quad[(i + 1) % 4], quad[(i + 2) % 4]))
            .collect();
        let convex = turns.iter().all(|&t| t > 0.0) || turns.iter().all(|&t| t < 0.0);
        if !convex {
            return None;
        }

        let min_side_sq = (0..4)
            .map(|i| (quad[i] - quad[(i + 1) % 4]).norm_squared())
            .fold(f32::INFINITY, f32::min);
        let min_side = contour.len() as f32 * p.min_corner_distance_rate as f32;
        if min_side_sq < min_side * min_side {
            return None;
        }

        let margin = p.min_distance_to_border as f32;
        let max_x = width as f32 - 1.0 - margin;
        let max_y = height as f32 - 1.0 - margin;
        if quad
            .iter()
            .any(|c| c.x < margin || c.y < margin || c.x > max_x || c.y > max_y)
        {
            return None;
        }

        if cross(quad[0], quad[1], quad[2]) < 0.0 {
            quad.swap(1, 3);
        }
        Some(quad)
    }

    /// Remove candidates lying on top of each other, keeping the larger one
    fn drop_near_duplicates(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let rate = self.params.min_marker_distance_rate as f32;
        let mut removed = vec![false; candidates.len()];

        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                if removed[i] || removed[j] {
                    continue;
                }
                let (a, b) = (&candidates[i], &candidates[j]);
                let limit = a.perimeter.min(b.perimeter) as f32 * rate;
                let too_close = (0..4).any(|shift| {
                    let dist_sq: f32 = (0..4)
                        .map(|k| (a.corners[(k + shift) % 4] - b.corners[k]).norm_squared())
                        .sum();
                    dist_sq / 4.0 < limit * limit
                });
                if too_close {
                    if a.perimeter >= b.perimeter {
                        removed[j] = true;
                    } else {
                        removed[i] = true;
                    }
                }
            }
        }

        candidates
            .into_iter()
            .zip(removed)
            .filter_map(|(c, gone)| (!gone).then_some(c))
            .collect()
    }

    /// Read the bit grid inside a candidate and match it against the dictionary
    fn decode(&self, gray: &GrayImage, corners: &[Point2<f32>; 4]) -> Option<MarkerObservation> {
        let p = &self.params;
        let dict = self.matcher.dictionary();
        let n = dict.marker_size;
        let border = p.marker_border_bits as usize;
        let cells = n + 2 * border;
        let ppc = p.perspective_remove_pixel_per_cell as usize;
        let side = cells * ppc;

        let last = (side - 1) as f32;
        let canonical = [
            Point2::new(0.0, 0.0),
            Point2::new(last, 0.0),
            Point2::new(last, last),
            Point2::new(0.0, last),
        ];
        let to_image = Homography::from_correspondences(&canonical, corners)?;

        let mut patch = Vec::with_capacity(side * side);
        for v in 0..side {
            for u in 0..side {
                let q = to_image.apply(Point2::new(u as f32, v as f32));
                patch.push(sample_bilinear(gray, q.x, q.y).round() as u8);
            }
        }

        let (_, std_dev) = mean_std(&patch);
        if std_dev < p.min_otsu_std_dev {
            return None;
        }
        let threshold = otsu_threshold(&patch);

        let margin = (ppc as f64 * p.perspective_remove_ignored_margin_per_cell) as usize;
        let span = ppc - 2 * margin;
        let cell_is_white = |cx: usize, cy: usize| -> bool {
            let mut white = 0usize;
            for v in (cy * ppc + margin)..(cy * ppc + margin + span) {
                for u in (cx * ppc + margin)..(cx * ppc + margin + span) {
                    if patch[v * side + u] > threshold {
                        white += 1;
                    }
                }
            }
            white * 2 > span * span
        };

        let max_border_errors = (dict.bit_count() as f64 * p.max_erroneous_bits_in_border_rate) as usize;
        let mut border_errors = 0usize;
        for cy in 0..cells {
            for cx in 0..cells {
                let in_border =
                    cx < border || cy < border || cx >= cells - border || cy >= cells - border;
                if in_border && cell_is_white(cx, cy) {
                    border_errors += 1;
                }
            }
        }
        if border_errors > max_border_errors {
            return None;
        }

        let mut code = 0u64;
        for bit in 0..dict.bit_count() {
            if cell_is_white(bit % n + border, bit / n + border) {
                code |= 1 << bit;
            }
        }

        let m = self.matcher.match_code(code)?;
        let r = m.rotation as usize;
        let corners = [0, 1, 2, 3].map(|k| corners[(k + r) % 4]);
        Some(MarkerObservation { id: m.id, corners })
    }
}

/// Detect markers of `dict` in a grayscale image
pub fn detect_markers(gray: &GrayImage, dict: Dictionary, params: &DetectorParams) -> Detection {
    MarkerDetector::new(dict, params.clone()).detect(gray)
}

/// Douglas-Peucker simplification of a closed contour
///
/// The contour is split at two mutually distant points so both halves are
/// open chains whose end points are already polygon vertices
pub fn approximate_closed_polygon(contour: &[Point2<f32>], epsilon: f32) -> Vec<Point2<f32>> {
    if contour.len() < 3 {
        return contour.to_vec();
    }

    let a = farthest_from(contour, 0);
    let b = farthest_from(contour, a);
    let (lo, hi) = (a.min(b), a.max(b));
    if lo == hi {
        return vec![contour[lo]];
    }

    let mut wrapped: Vec<Point2<f32>> = contour[hi..].to_vec();
    wrapped.extend_from_slice(&contour[..=lo]);

    let mut out = Vec::new();
    simplify_open(&contour[lo..=hi], epsilon, &mut out);
    out.pop();
    simplify_open(&wrapped, epsilon, &mut out);
    out.pop();
    out
}

fn farthest_from(contour: &[Point2<f32>], from: usize) -> usize {
    let origin = contour[from];
    contour
        .iter()
        .enumerate()
        .max_by(|(_, p), (_, q)| {
            (**p - origin)
                .norm_squared()
                .total_cmp(&(**q - origin).norm_squared())
        })
        .map_or(from, |(i, _)| i)
}

/// Appends the simplified chain, both end points included
fn simplify_open(chain: &[Point2<f32>], epsilon: f32, out: &mut Vec<Point2<f32>>) {
    let start = chain[0];
    let end = chain[chain.len() - 1];

    let mut max_dist = 0.0f32;
    let mut index = 0usize;
    for (i, &pt) in chain.iter().enumerate().take(chain.len() - 1).skip(1) {
        let d = distance_to_segment(pt, start, end);
        if d > max_dist {
            max_dist = d;
            index = i;
        }
    }

    if max_dist > epsilon {
        simplify_open(&chain[..=index], epsilon, out);
        out.pop();
        simplify_open(&chain[index..], epsilon, out);
    } else {
        out.push(start);
        out.push(end);
    }
}

fn distance_to_segment(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < f32::EPSILON {
        return (p - a).norm();
    }
    cross(a, b, p).abs() / len_sq.sqrt()
}

/// Bilinear sample with edge clamping
fn sample_bilinear(gray: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let px = |xx: u32, yy: u32| gray.get_pixel(xx, yy)[0] as f32;
    let top = px(x0, y0) * (1.0 - fx) + px(x1, y0) * fx;
    let bottom = px(x0, y1) * (1.0 - fx) + px(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Move a corner to the point where image gradients in a window around it
/// are orthogonal to the offsets from it
///
/// Returns the input unchanged when the iteration leaves the window or the
/// gradient structure is singular
fn refine_corner(gray: &GrayImage, start: Point2<f32>, p: &DetectorParams) -> Point2<f32> {
    let win = p.corner_refinement_win_size as i32;
    let win_f = win as f64;
    let eps_sq = p.corner_refinement_min_accuracy * p.corner_refinement_min_accuracy;
    let mut c = Vector2::new(start.x as f64, start.y as f64);

    for _ in 0..p.corner_refinement_max_iterations {
        let mut g = Matrix2::<f64>::zeros();
        let mut rhs = Vector2::<f64>::zeros();

        for dy in -win..=win {
            for dx in -win..=win {
                let px = c.x + dx as f64;
                let py = c.y + dy as f64;
                let (fx, fy) = (px as f32, py as f32);
                let gx = 0.5
                    * (sample_bilinear(gray, fx + 1.0, fy) - sample_bilinear(gray, fx - 1.0, fy))
                        as f64;
                let gy = 0.5
                    * (sample_bilinear(gray, fx, fy + 1.0) - sample_bilinear(gray, fx, fy - 1.0))
                        as f64;

                let nx = dx as f64 / win_f;
                let ny = dy as f64 / win_f;
                let weight = (-(nx * nx) - ny * ny).exp();

                let gxx = gx * gx * weight;
                let gxy = gx * gy * weight;
                let gyy = gy * gy * weight;
                g[(0, 0)] += gxx;
                g[(0, 1)] += gxy;
                g[(1, 0)] += gxy;
                g[(1, 1)] += gyy;
                rhs.x += gxx * px + gxy * py;
                rhs.y += gxy * px + gyy * py;
            }
        }

        if g.determinant().abs() < 1e-9 {
            break;
        }
        let Some(inv) = g.try_inverse() else {
            break;
        };
        let next = inv * rhs;
        let step_sq = (next - c).norm_squared();
        c = next;
        if step_sq <= eps_sq {
            break;
        }
    }

    if (c.x - start.x as f64).abs() > win_f || (c.y - start.y as f64).abs() > win_f {
        return start;
    }
    Point2::new(c.x as f32, c.y as f32)
}
