use image::{GrayImage, Luma};

/// A fixed ArUco dictionary
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Human-readable name (for logging)
    pub name: &'static str,
    /// Marker side length in inner bits
    pub marker_size: usize,
    /// Maximum number of bit errors the dictionary can correct
    pub max_correction_bits: u8,
    /// One code per marker id, inner bits in row-major order (`idx = y * N + x`),
    /// **white = 1**
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of inner bits per marker
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Render marker `id` with a one-cell black border, `cell_px` pixels per cell
    pub fn render_marker(&self, id: u32, cell_px: u32) -> Option<GrayImage> {
        let code = *self.codes.get(id as usize)?;
        if cell_px == 0 {
            return None;
        }
        let n = self.marker_size as u32;
        let side = (n + 2) * cell_px;

        Some(GrayImage::from_fn(side, side, |x, y| {
            let cx = x / cell_px;
            let cy = y / cell_px;
            if cx == 0 || cy == 0 || cx > n || cy > n {
                return Luma([0]);
            }
            let idx = (cy - 1) * n + (cx - 1);
            if (code >> idx) & 1 == 1 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }
}

/// Predefined dictionary 0: 50 markers of 4x4 bits
pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    max_correction_bits: 1,
    codes: &DICT_4X4_50_CODES,
};

#[rustfmt::skip]
const DICT_4X4_50_CODES: [u64; 50] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23,
    0x5b7f, 0x6af3, 0x899f, 0xe588, 0xed70, 0xf054, 0x8d24, 0x7c64,
    0xa662, 0x0066, 0x7a36, 0xf56e, 0xd161, 0xd40d, 0xab33, 0x41bb,
    0xe27f, 0x8e29, 0x2735, 0x2aa5, 0xc484, 0xf62c, 0xa822, 0x4dea,
    0xf379, 0xd30f, 0x7510, 0x9490, 0xae18, 0xff20, 0x6fb0, 0x5a38,
    0x18e8, 0x1454, 0x314c, 0x4d1c, 0x1724, 0xd774, 0xfcb4, 0x26d2,
    0x740a, 0xc80a,
];

/// A dictionary match for an observed code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary
    pub id: u32,
    /// How many times the observed grid was turned (see [`turn_code`]) to match
    pub rotation: u8,
    /// Hamming distance between the turned observation and the dictionary code
    pub hamming: u8,
}

/// Brute-force matcher over all ids and rotations
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
}

impl Matcher {
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        Self { dict, max_hamming }
    }

    /// Matcher allowing `floor(max_correction_bits * rate)` bit errors
    pub fn with_correction_rate(dict: Dictionary, rate: f64) -> Self {
        let max_hamming = (dict.max_correction_bits as f64 * rate.clamp(0.0, 1.0)).floor() as u8;
        Self::new(dict, max_hamming)
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match for an observed grid read starting at an arbitrary corner
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let n = self.dict.marker_size;
        let mut best: Option<Match> = None;
        let mut turned = observed;

        for rotation in 0..4u8 {
            for (id, &code) in self.dict.codes.iter().enumerate() {
                let h = (turned ^ code).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.map_or(true, |b| h < b.hamming) {
                    best = Some(Match {
                        id: id as u32,
                        rotation,
                        hamming: h,
                    });
                    if h == 0 {
                        return best;
                    }
                }
            }
            turned = turn_code(turned, n);
        }

        best
    }
}

/// Re-read an `n x n` grid starting from the next corner clockwise
///
/// Output cell `(x, y)` is input cell `(n - 1 - y, x)`: the old top-right
/// corner becomes the new top-left
pub fn turn_code(code: u64, n: usize) -> u64 {
    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let src = y * n + x;
            let dst_x = y;
            let dst_y = n - 1 - x;
            // Inverse of the mapping above, written as a scatter.
            out |= ((code >> src) & 1) << (dst_y * n + dst_x);
        }
    }
    out
}
