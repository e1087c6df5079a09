use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// Magnitude spectrum of fixed-size real windows, via realfft.
///
/// No window function, no scaling: bin `k` is `|Σ x[n]·e^(-2πikn/N)|`.
/// The transform runs in f64; magnitudes are returned as f32.
///
/// Pre-allocates the FFT plan and scratch buffers so `process` does not
/// reallocate them between windows.
///
/// # Example
/// ```
/// use bm_audio::spectrum::MagnitudeSpectrum;
/// let fft = MagnitudeSpectrum::new(512);
/// assert_eq!(fft.bins(), 257);
/// ```
pub struct MagnitudeSpectrum {
    input_buf: Vec<f64>,
    spectrum_buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    plan: Arc<dyn RealToComplex<f64>>,
}

impl MagnitudeSpectrum {
    /// Create a pipeline for windows of `size` samples.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f64>::new();
        let plan = planner.plan_fft_forward(size);

        Self {
            input_buf: plan.make_input_vec(),
            spectrum_buf: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        }
    }

    /// Output length (`size / 2 + 1`).
    #[must_use]
    pub fn bins(&self) -> usize {
        self.spectrum_buf.len()
    }

    /// Magnitudes of one window, written into `out`.
    ///
    /// Inputs shorter than `size` are zero-padded, longer ones truncated.
    /// `out` must hold [`bins`](Self::bins) values.
    pub fn process_into(&mut self, window: ArrayView1<'_, f32>, out: &mut [f32]) {
        self.input_buf.fill(0.0);
        for (slot, &x) in self.input_buf.iter_mut().zip(window.iter()) {
            *slot = f64::from(x);
        }

        // Lengths come from the plan itself, so this cannot fail.
        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            out.fill(0.0);
            return;
        }

        for (dst, c) in out.iter_mut().zip(&self.spectrum_buf) {
            *dst = c.norm() as f32;
        }
    }

    /// Magnitudes of one window.
    ///
    /// # Example
    /// ```
    /// use bm_audio::spectrum::MagnitudeSpectrum;
    /// use ndarray::Array1;
    ///
    /// let mut fft = MagnitudeSpectrum::new(8);
    /// let dc = Array1::from_elem(8, 1.0f32);
    /// let mags = fft.process(dc.view());
    /// assert_eq!(mags.len(), 5);
    /// assert!((mags[0] - 8.0).abs() < 1e-5);
    /// ```
    pub fn process(&mut self, window: ArrayView1<'_, f32>) -> Vec<f32> {
        let mut out = vec![0.0; self.bins()];
        self.process_into(window, &mut out);
        out
    }
}

/// Replace every row of `segments` by its magnitude spectrum.
///
/// Rows are transformed in parallel (one plan per rayon worker); the output
/// keeps the input row order. Output shape is `(rows, L/2 + 1)`.
///
/// # Example
/// ```
/// use bm_audio::spectrum::magnitude_spectra;
/// use ndarray::Array2;
///
/// let segments = Array2::<f32>::zeros((12, 512));
/// let spectra = magnitude_spectra(&segments);
/// assert_eq!(spectra.dim(), (12, 257));
/// ```
#[must_use]
pub fn magnitude_spectra(segments: &Array2<f32>) -> Array2<f32> {
    let size = segments.ncols().max(1);
    let bins = size / 2 + 1;
    let mut spectra = Array2::<f32>::zeros((segments.nrows(), bins));

    if let Some(flat) = spectra.as_slice_mut() {
        let rows: Vec<ArrayView1<'_, f32>> = segments.rows().into_iter().collect();
        flat.par_chunks_mut(bins)
            .zip(rows.par_iter())
            .for_each_init(
                || MagnitudeSpectrum::new(size),
                |fft, (out, row)| fft.process_into(row.view(), out),
            );
    }
    spectra
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;
    use std::f32::consts::PI;

    fn tone(size: usize, bin: usize, amplitude: f32) -> Array1<f32> {
        Array1::from_shape_fn(size, |n| {
            amplitude * (2.0 * PI * bin as f32 * n as f32 / size as f32).cos()
        })
    }

    #[test]
    fn pure_tone_lands_in_its_bin() {
        let mut fft = MagnitudeSpectrum::new(512);
        let mags = fft.process(tone(512, 32, 1.0).view());
        assert_eq!(mags.len(), 257);
        // Unscaled real DFT of a unit cosine: N/2 at its bin.
        assert_abs_diff_eq!(mags[32], 256.0, epsilon = 1e-2);
        for (k, &m) in mags.iter().enumerate() {
            if k != 32 {
                assert!(m < 1e-2, "leak at bin {k}: {m}");
            }
        }
    }

    #[test]
    fn magnitudes_are_non_negative() {
        let segments = Array2::from_shape_fn((12, 512), |(r, c)| {
            ((r * 31 + c * 17) % 97) as f32 / 48.0 - 1.0
        });
        let spectra = magnitude_spectra(&segments);
        assert_eq!(spectra.dim(), (12, 257));
        assert!(spectra.iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn parallel_rows_match_sequential() {
        let segments = Array2::from_shape_fn((40, 64), |(r, c)| ((r + 1) * (c + 3)) as f32 % 11.0);
        let spectra = magnitude_spectra(&segments);
        let mut fft = MagnitudeSpectrum::new(64);
        for (r, row) in segments.rows().into_iter().enumerate() {
            let expected = fft.process(row);
            for (k, &m) in expected.iter().enumerate() {
                assert_abs_diff_eq!(spectra[[r, k]], m, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn short_input_is_zero_padded() {
        let mut fft = MagnitudeSpectrum::new(16);
        let mags = fft.process(Array1::from_elem(4, 1.0f32).view());
        assert_abs_diff_eq!(mags[0], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_matrix_gives_empty_spectra() {
        let spectra = magnitude_spectra(&Array2::zeros((0, 512)));
        assert_eq!(spectra.dim(), (0, 257));
    }
}
