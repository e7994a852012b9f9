use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Planar projective transform `dst ~ H * src`, normalized so `h33 = 1`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    /// Compute H from exactly four correspondences (order must match)
    ///
    /// Returns `None` when the points are degenerate (three collinear, repeated
    /// points, ...)
    pub fn from_correspondences(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Self> {
        // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], h33 = 1
        //   h11 x + h12 y + h13 - u h31 x - u h32 y = u
        //   h21 x + h22 y + h23 - v h31 x - v h32 y = v
        let (src_n, t_src) = normalize_points(src)?;
        let (dst_n, t_dst) = normalize_points(dst)?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for k in 0..4 {
            let (x, y) = (src_n[k].x, src_n[k].y);
            let (u, v) = (dst_n[k].x, dst_n[k].y);

            let r0 = 2 * k;
            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = 1.0;
            a[(r0, 6)] = -u * x;
            a[(r0, 7)] = -u * y;
            b[r0] = u;

            let r1 = 2 * k + 1;
            a[(r1, 3)] = x;
            a[(r1, 4)] = y;
            a[(r1, 5)] = 1.0;
            a[(r1, 6)] = -v * x;
            a[(r1, 7)] = -v * y;
            b[r1] = v;
        }

        let x = a.lu().solve(&b)?;
        if x.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let hn = Matrix3::new(
            x[0], x[1], x[2], //
            x[3], x[4], x[5], //
            x[6], x[7], 1.0,
        );

        let h = t_dst.try_inverse()? * hn * t_src;
        let s = h[(2, 2)];
        if s.abs() < 1e-12 {
            return None;
        }
        let h = h / s;

        // A rank-deficient solution maps the plane onto a line.
        if h.determinant().abs() < 1e-12 {
            return None;
        }
        Some(Self::new(h))
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let (x, y) = transform_point(&self.h, p.x as f64, p.y as f64);
        Point2::new(x as f32, y as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Row-major `f32` entries, the layout `imageproc` projections take
    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let mut out = [0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                out[r * 3 + c] = self.h[(r, c)] as f32;
            }
        }
        out
    }
}

/// Transform a point with a projective matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = matrix * Vector3::new(x, y, 1.0);
    (p.x / p.z, p.y / p.z)
}

/// Hartley normalization: centroid to origin, mean distance `sqrt(2)`
fn normalize_points(pts: &[Point2<f32>; 4]) -> Option<([Point2<f64>; 4], Matrix3<f64>)> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);

    let mut out = [Point2::new(0.0, 0.0); 4];
    for (o, p) in out.iter_mut().zip(pts) {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        *o = Point2::new(v.x, v.y);
    }
    Some((out, t))
}

/// Signed area of the triangle `(a, b, c)`, times two. Positive when the
/// turn is clockwise in image coordinates (y down)
#[inline]
pub fn cross(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}
