use image::GrayImage;
use imageproc::filter::box_filter;

/// Inverted adaptive mean threshold
///
/// A pixel becomes foreground (255) when it is at least `constant` darker
/// than the mean of the `window x window` box around it. Flat regions,
/// black or white, stay background
pub(crate) fn adaptive_threshold_inv(gray: &GrayImage, window: u32, constant: f64) -> GrayImage {
    let radius = window / 2;
    let mean = box_filter(gray, radius, radius);

    let mut out = GrayImage::new(gray.width(), gray.height());
    for ((dst, &v), &m) in out.iter_mut().zip(gray.iter()).zip(mean.iter()) {
        *dst = if v as f64 <= m as f64 - constant { 255 } else { 0 };
    }
    out
}

/// Otsu threshold from a set of sample intensities
pub(crate) fn otsu_threshold(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}

/// Mean and population standard deviation
pub(crate) fn mean_std(samples: &[u8]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_otsu_splits_bimodal_samples() {
        let mut samples = vec![20u8; 50];
        samples.extend(std::iter::repeat(220u8).take(50));
        let t = otsu_threshold(&samples);
        assert!((20..220).contains(&t));
    }

    #[test]
    fn test_flat_image_has_no_foreground() {
        for level in [0u8, 128, 255] {
            let img = GrayImage::from_pixel(20, 20, Luma([level]));
            let bin = adaptive_threshold_inv(&img, 7, 7.0);
            assert!(bin.iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_dark_edge_becomes_foreground() {
        let img = GrayImage::from_fn(20, 20, |x, _| if x < 10 { Luma([0]) } else { Luma([255]) });
        let bin = adaptive_threshold_inv(&img, 3, 7.0);
        assert_eq!(bin.get_pixel(9, 10)[0], 255);
        assert_eq!(bin.get_pixel(10, 10)[0], 0);
        assert_eq!(bin.get_pixel(3, 10)[0], 0);
    }

    #[test]
    fn test_mean_std_of_constant_is_zero() {
        let (m, s) = mean_std(&[9, 9, 9]);
        assert_eq!(m, 9.0);
        assert_eq!(s, 0.0);
    }
}
