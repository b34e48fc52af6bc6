//! Fallback downsampling to the 8 kHz forwarding rate.
//!
//! While the decoder module is not up, completed frames are not decoded
//! locally — they are downsampled to 8 kHz and forwarded so the consumer can
//! run its own processing path.  [`downsample`] is that conversion: a pure
//! function over one frame, writing into a caller-owned scratch buffer so
//! the steady-state path stays allocation-free.
//!
//! The interpolation is linear — adequate for the narrow-band forwarding
//! path, and branch-free enough for the processing thread.

// ---------------------------------------------------------------------------
// resampled_capacity
// ---------------------------------------------------------------------------

/// Worst-case output length of [`downsample`] for a `frame_size`-sample
/// frame: `ceil(frame_size * target_rate / source_rate)`.
///
/// Size the scratch buffer with this once, at the first fallback frame.
///
/// # Example
///
/// ```rust
/// use mt63_rx::audio::resampled_capacity;
///
/// // 2304 samples at 48 kHz → at most 384 samples at 8 kHz.
/// assert_eq!(resampled_capacity(2304, 48_000, 8_000), 384);
/// ```
pub fn resampled_capacity(frame_size: usize, source_rate: u32, target_rate: u32) -> usize {
    (frame_size * target_rate as usize).div_ceil(source_rate as usize)
}

// ---------------------------------------------------------------------------
// downsample
// ---------------------------------------------------------------------------

/// Resample the first `len` samples of `input` from `source_rate` Hz to
/// `target_rate` Hz by linear interpolation, writing into `output`.
///
/// Returns the number of samples produced — `ceil(len * target / source)`,
/// capped at `output.len()`.  With `output` sized by [`resampled_capacity`]
/// the cap never engages.
///
/// * Equal rates copy the input through unchanged.
/// * `len == 0` produces 0 samples.
///
/// # Example
///
/// ```rust
/// use mt63_rx::audio::downsample;
///
/// let input = vec![0.5_f32; 480]; // 10 ms @ 48 kHz
/// let mut out = vec![0.0_f32; 80];
/// let n = downsample(&input, input.len(), 48_000, 8_000, &mut out);
/// assert_eq!(n, 80); // 10 ms @ 8 kHz
/// ```
pub fn downsample(
    input: &[f32],
    len: usize,
    source_rate: u32,
    target_rate: u32,
    output: &mut [f32],
) -> usize {
    let input = &input[..len];

    if len == 0 {
        return 0;
    }

    if source_rate == target_rate {
        let n = len.min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        return n;
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let produced = ((len as f64) * ratio).ceil() as usize;
    let produced = produced.min(output.len());

    for (i, out) in output[..produced].iter_mut().enumerate() {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        *out = if idx + 1 < len {
            // Linear interpolation between adjacent samples
            input[idx] * (1.0 - frac) + input[idx + 1] * frac
        } else if idx < len {
            input[idx]
        } else {
            0.0
        };
    }

    produced
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
