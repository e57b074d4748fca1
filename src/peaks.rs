//! Zero-intensity pruning and centroid/profile classification
//!
//! Profile spectra sample the whole m/z axis and carry long runs of exact
//! zero intensities between peaks. Only the zeros touching a nonzero sample
//! are kept, so each peak keeps its shoulders and the baseline between peaks
//! collapses to a single pair of zeros.

/// Peak arrays after sanitization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedPeaks {
    /// m/z values, in input order
    pub mz_values: Vec<f64>,
    /// Intensity values paired with `mz_values`
    pub intensity_values: Vec<f64>,
    /// `true` when the input was non-empty and carried no exact-zero intensity
    pub centroided: bool,
}

impl SanitizedPeaks {
    /// Number of retained points
    pub fn len(&self) -> usize {
        self.mz_values.len()
    }

    /// Whether no points were retained
    pub fn is_empty(&self) -> bool {
        self.mz_values.is_empty()
    }
}

/// A scan is centroided when it has points and none of its intensities is
/// exactly zero. An empty scan counts as profile, the same as an all-zero scan
/// after pruning.
pub fn is_centroided(intensity_values: &[f64]) -> bool {
    !intensity_values.is_empty() && !intensity_values.iter().any(|&i| i == 0.0)
}

/// Classify a scan and prune the zero-intensity samples that are not
/// adjacent to a nonzero sample.
///
/// Both arrays must have the same length; the caller checks this.
pub fn sanitize(mz_values: Vec<f64>, intensity_values: Vec<f64>) -> SanitizedPeaks {
    debug_assert_eq!(mz_values.len(), intensity_values.len());

    if is_centroided(&intensity_values) {
        return SanitizedPeaks {
            mz_values,
            intensity_values,
            centroided: true,
        };
    }

    let n = intensity_values.len();
    let nonzero = |i: usize| intensity_values[i] != 0.0;
    let mut kept_mz = Vec::with_capacity(n);
    let mut kept_intensity = Vec::with_capacity(n);

    for i in 0..n {
        let keep = nonzero(i) || (i > 0 && nonzero(i - 1)) || (i + 1 < n && nonzero(i + 1));
        if keep {
            kept_mz.push(mz_values[i]);
            kept_intensity.push(intensity_values[i]);
        }
    }

    SanitizedPeaks {
        mz_values: kept_mz,
        intensity_values: kept_intensity,
        centroided: false,
    }
}
