//! `FeatureMatrix`: a (D × T) feature matrix, stored frame-major (one `Vec<f32>`
//! of length D per time frame) because every downstream consumer — row
//! normalization, DTW local distance — operates per time frame.

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// `frames[t]` is the D-dimensional feature vector for time frame `t`.
    pub frames: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self { frames }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn dim(&self) -> usize {
        self.frames.first().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True if every value is finite (no NaN/Inf) — spec invariant for
    /// feature bundles.
    pub fn is_finite(&self) -> bool {
        self.frames.iter().all(|f| f.iter().all(|v| v.is_finite()))
    }

    /// L2-normalize each time frame (each column of the logical D×T matrix)
    /// across its D feature dimensions, in place.
    pub fn l2_normalize_frames(&mut self) {
        for frame in &mut self.frames {
            let norm: f32 = frame.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 1e-10 {
                for v in frame.iter_mut() {
                    *v /= norm;
                }
            }
        }
    }

    /// Trim to the first `max_frames` time frames.
    pub fn truncate_frames(&mut self, max_frames: usize) {
        if self.frames.len() > max_frames {
            self.frames.truncate(max_frames);
        }
    }
}
