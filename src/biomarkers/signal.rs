//! Small numeric helpers shared by the extractors.

/// Sign of a sample: -1, 0 or 1 (zero stays zero)
fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Number of adjacent sample pairs whose sign differs.
///
/// A step from zero to a signed value counts as a change.
pub(crate) fn sign_changes(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| sign(w[0] as f64) != sign(w[1] as f64))
        .count()
}

/// Root-mean-square amplitude, 0 for an empty slice
pub(crate) fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Population standard deviation, 0 for an empty slice
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Moving average of `|x|` over `window` samples, same length as the input.
///
/// Output index `i` averages input samples `i + (window-1)/2 - (window-1) ..= i + (window-1)/2`
/// (clipped at the edges, always divided by `window`), i.e. a centred boxcar.
pub(crate) fn smoothed_envelope(samples: &[f32], window: usize) -> Vec<f64> {
    let n = samples.len();
    if n == 0 || window == 0 {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += (s as f64).abs();
        prefix.push(acc);
    }

    let offset = (window - 1) / 2;
    let scale = 1.0 / window as f64;
    (0..n)
        .map(|i| {
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset + 1).saturating_sub(window);
            (prefix[hi + 1] - prefix[lo]) * scale
        })
        .collect()
}

/// Count local maxima: points where the slope sign steps downward
pub(crate) fn count_peaks(values: &[f64]) -> usize {
    if values.len() < 3 {
        return 0;
    }
    let slopes: Vec<i8> = values.windows(2).map(|w| sign(w[1] - w[0])).collect();
    slopes.windows(2).filter(|w| w[1] < w[0]).count()
}
