use yomi_types::Frame;

const BLACK_MEAN_LIMIT: f64 = 2.5;
const BLACK_STDDEV_LIMIT: f64 = 1.5;
const EPSILON: f64 = 1e-9;

/// Bad captures (exclusive fullscreen, compositor hiccups) come back as an
/// almost uniformly black bitmap.
pub fn is_nearly_black(frame: &Frame) -> bool {
    if frame.is_empty() {
        return true;
    }

    let count = f64::from(frame.width()) * f64::from(frame.height());
    let mut sum = [0f64; 3];
    let mut sum_sq = [0f64; 3];
    for pixel in frame.image().pixels() {
        for (channel, value) in pixel.0.iter().enumerate() {
            let value = f64::from(*value);
            sum[channel] += value;
            sum_sq[channel] += value * value;
        }
    }

    let mut max_mean = 0f64;
    let mut max_stddev = 0f64;
    for channel in 0..3 {
        let mean = sum[channel] / count;
        let variance = (sum_sq[channel] / count - mean * mean).max(0.0);
        max_mean = max_mean.max(mean);
        max_stddev = max_stddev.max(variance.sqrt());
    }

    max_mean < BLACK_MEAN_LIMIT && max_stddev < BLACK_STDDEV_LIMIT
}

/// 256-bin grayscale histogram, min-max normalized into 0..=1
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: [f64; 256],
}

impl Histogram {
    pub fn from_frame(frame: &Frame) -> Self {
        let mut bins = [0f64; 256];
        for pixel in frame.image().pixels() {
            let [r, g, b] = pixel.0;
            let gray = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
            bins[gray.round().clamp(0.0, 255.0) as usize] += 1.0;
        }

        let (min, max) = bins
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let range = max - min;
        if range.abs() < EPSILON {
            bins = [0f64; 256];
        } else {
            for bin in bins.iter_mut() {
                *bin = (*bin - min) / range;
            }
        }

        Self { bins }
    }

    pub fn bins(&self) -> &[f64; 256] {
        &self.bins
    }
}

/// Pearson correlation of two histograms, 1.0 for degenerate (flat) input
pub fn correlation(a: &Histogram, b: &Histogram) -> f64 {
    let n = a.bins.len() as f64;
    let mean_a = a.bins.iter().sum::<f64>() / n;
    let mean_b = b.bins.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.bins.iter().zip(b.bins.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denominator = (var_a * var_b).sqrt();
    if denominator.abs() < EPSILON {
        return 1.0;
    }
    numerator / denominator
}

/// Drops frames whose histogram barely moved since the last kept frame
#[derive(Debug)]
pub struct ChangeDetector {
    previous: Option<Histogram>,
    threshold: f64,
}

impl ChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            previous: None,
            threshold,
        }
    }

    /// `true` when the frame should be kept; kept frames become the new reference
    pub fn is_changed(&mut self, frame: &Frame) -> bool {
        let current = Histogram::from_frame(frame);
        if let Some(previous) = &self.previous {
            if correlation(previous, &current) > self.threshold {
                return false;
            }
        }
        self.previous = Some(current);
        true
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
