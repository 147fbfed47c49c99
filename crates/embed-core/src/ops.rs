//! Flat-buffer tensor operations.
//!
//! The reductions in this crate need only a handful of primitives: expand a
//! tensor along a new trailing axis, reduce along one axis, divide by a
//! reduced tensor broadcast back along that axis, a transposed matrix
//! product and partial top-k selection. All of them work on row-major
//! buffers with an explicit [`TensorShape`].

use std::cmp::Ordering;

use crate::error::CoreError;
use crate::shape::TensorShape;

fn axis_split(shape: &TensorShape, axis: usize) -> Result<(usize, usize, usize), CoreError> {
    shape.split_at_axis(axis).ok_or_else(|| {
        CoreError::InvalidArgument(format!("axis {} out of range for shape {}", axis, shape))
    })
}

fn remove_axis(shape: &TensorShape, axis: usize) -> TensorShape {
    let mut dims = shape.dims().to_vec();
    dims.remove(axis);
    TensorShape::new(dims)
}

/// Repeat every element `extent` times along a new trailing axis.
///
/// `[b, s]` with extent `h` becomes `[b, s, h]`.
pub fn expand_last(values: &[f32], shape: &TensorShape, extent: usize) -> (Vec<f32>, TensorShape) {
    let mut out = Vec::with_capacity(values.len() * extent);
    for &v in values {
        out.extend(std::iter::repeat(v).take(extent));
    }
    let mut dims = shape.dims().to_vec();
    dims.push(extent);
    (out, TensorShape::new(dims))
}

/// Sum over `axis`, dropping it from the shape.
pub fn sum_axis(
    data: &[f32],
    shape: &TensorShape,
    axis: usize,
) -> Result<(Vec<f32>, TensorShape), CoreError> {
    shape.check_buffer("tensor", data.len())?;
    let (outer, extent, inner) = axis_split(shape, axis)?;

    let mut out = vec![0.0f32; outer * inner];
    for o in 0..outer {
        for k in 0..extent {
            let src = &data[(o * extent + k) * inner..(o * extent + k + 1) * inner];
            let dst = &mut out[o * inner..(o + 1) * inner];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }
    Ok((out, remove_axis(shape, axis)))
}

/// p-norm over `axis`, dropping it from the shape.
///
/// `p = 2` is the Euclidean norm, `p = 1` the sum of magnitudes and
/// `p = f32::INFINITY` the largest magnitude.
pub fn norm_axis(
    data: &[f32],
    shape: &TensorShape,
    axis: usize,
    p: f32,
) -> Result<(Vec<f32>, TensorShape), CoreError> {
    if p.is_nan() || p <= 0.0 {
        return Err(CoreError::InvalidArgument(format!(
            "norm order must be positive, got {}",
            p
        )));
    }
    shape.check_buffer("tensor", data.len())?;
    let (outer, extent, inner) = axis_split(shape, axis)?;

    let mut acc = vec![0.0f32; outer * inner];
    for o in 0..outer {
        for k in 0..extent {
            let base = (o * extent + k) * inner;
            for i in 0..inner {
                let x = data[base + i].abs();
                let slot = &mut acc[o * inner + i];
                if p == f32::INFINITY {
                    *slot = slot.max(x);
                } else if p == 2.0 {
                    *slot += x * x;
                } else if p == 1.0 {
                    *slot += x;
                } else {
                    *slot += x.powf(p);
                }
            }
        }
    }

    if p == 2.0 {
        acc.iter_mut().for_each(|v| *v = v.sqrt());
    } else if p != 1.0 && p != f32::INFINITY {
        acc.iter_mut().for_each(|v| *v = v.powf(1.0 / p));
    }
    Ok((acc, remove_axis(shape, axis)))
}

/// Clamp every element to at least `min`.
pub fn clamp_min(data: &mut [f32], min: f32) {
    for v in data.iter_mut() {
        if *v < min {
            *v = min;
        }
    }
}

/// Divide `data` by `denom`, broadcasting `denom` back along `axis`.
///
/// `denom` has the shape of `data` with `axis` removed.
pub fn broadcast_div_axis(
    data: &[f32],
    shape: &TensorShape,
    axis: usize,
    denom: &[f32],
) -> Result<Vec<f32>, CoreError> {
    shape.check_buffer("tensor", data.len())?;
    let (outer, extent, inner) = axis_split(shape, axis)?;
    remove_axis(shape, axis).check_buffer("denominator", denom.len())?;

    let mut out = Vec::with_capacity(data.len());
    for o in 0..outer {
        let d = &denom[o * inner..(o + 1) * inner];
        for k in 0..extent {
            let base = (o * extent + k) * inner;
            out.extend(data[base..base + inner].iter().zip(d).map(|(x, y)| x / y));
        }
    }
    Ok(out)
}

/// `a · bᵀ` for row-major `a` (`[a_rows, cols]`) and `b` (`[b_rows, cols]`).
///
/// Returns an `[a_rows, b_rows]` buffer.
pub fn matmul_transposed(
    a: &[f32],
    a_rows: usize,
    b: &[f32],
    b_rows: usize,
    cols: usize,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(a_rows * b_rows);
    for i in 0..a_rows {
        let row_a = &a[i * cols..(i + 1) * cols];
        for j in 0..b_rows {
            let row_b = &b[j * cols..(j + 1) * cols];
            out.push(row_a.iter().zip(row_b).map(|(x, y)| x * y).sum());
        }
    }
    out
}

/// Descending by value, ascending by index on ties.
fn rank_order(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

/// The `k` largest values of `row` with their positions, sorted descending.
///
/// Equal values keep their original order. Uses a partial selection so the
/// full row is never sorted.
pub fn top_k(row: &[f32], k: usize) -> Vec<(f32, usize)> {
    let k = k.min(row.len());
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f32, usize)> = row.iter().copied().zip(0..).collect();
    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, rank_order);
        scored.truncate(k);
    }
    scored.sort_by(rank_order);
    scored
}
