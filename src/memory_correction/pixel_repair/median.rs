//! Square-window median filtering with replicated edges.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// Median of a slice using partial sorting. NaNs order after every number.
fn median_slice(data: &mut [f32]) -> f32 {
    let mid = data.len() / 2;
    let (_, median, _) = data.select_nth_unstable_by(mid, |a, b| {
        a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
    });
    *median
}

#[inline(always)]
fn clamp_index(idx: isize, len: usize) -> usize {
    idx.clamp(0, len as isize - 1) as usize
}

/// Median of the `window × window` neighbourhood centred on `(y, x)`.
///
/// Out-of-range neighbours take the value of the nearest edge pixel. `buf` is
/// scratch space reused across calls. An empty image has no median and gives NaN.
pub fn median_at(image: &ArrayView2<'_, f32>, y: usize, x: usize, window: usize, buf: &mut Vec<f32>) -> f32 {
    let (height, width) = image.dim();
    if height == 0 || width == 0 {
        return f32::NAN;
    }
    let radius = (window / 2) as isize;
    buf.clear();
    for dy in -radius..=radius {
        let yy = clamp_index(y as isize + dy, height);
        for dx in -radius..=radius {
            let xx = clamp_index(x as isize + dx, width);
            buf.push(image[[yy, xx]]);
        }
    }
    median_slice(buf)
}

/// Median filter over the whole image, rows processed in parallel.
pub fn median_filter_2d(image: ArrayView2<'_, f32>, window: usize) -> Array2<f32> {
    let (height, width) = image.dim();
    let mut output = Array2::<f32>::zeros((height, width));
    if height == 0 || width == 0 {
        return output;
    }

    let rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
    rows.into_par_iter().enumerate().for_each(|(y, mut row)| {
        let mut buf = Vec::with_capacity(window * window);
        for x in 0..width {
            row[x] = median_at(&image, y, x, window, &mut buf);
        }
    });
    output
}
