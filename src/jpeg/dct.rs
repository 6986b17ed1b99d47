//! Discrete Cosine Transform (DCT) for 8x8 blocks.
//!
//! Blocks are row-major `[f64; 64]`, index `x * 8 + y` for sample `(x, y)`
//! and `u * 8 + v` for frequency `(u, v)`. The forward transform is
//!
//! ```text
//! F(u,v) = 1/4 a(u) a(v) sum_x sum_y f(x,y) cos((2x+1)u pi/16) cos((2y+1)v pi/16)
//! ```
//!
//! with `a(0) = 1/sqrt(2)` and `a(k) = 1` otherwise. The inverse is the
//! adjoint with the same normalization.

use std::f64::consts::PI;

/// Which forward transform to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DctMethod {
    /// Direct double sum per coefficient.
    #[default]
    Reference,
    /// Separable AAN butterfly.
    Fast,
}

/// Precomputed cosine and normalization tables.
///
/// Built once per encoder or decoder and shared read-only between threads.
#[derive(Debug, Clone)]
pub struct DctTables {
    /// `cos[x][u] = cos((2x + 1) * u * PI / 16)`
    cos: [[f64; 8]; 8],
    alpha: [f64; 8],
}

impl DctTables {
    /// Precompute the cosine tables.
    pub fn new() -> Self {
        let mut cos = [[0.0f64; 8]; 8];
        for (x, row) in cos.iter_mut().enumerate() {
            for (u, c) in row.iter_mut().enumerate() {
                *c = (((2 * x + 1) * u) as f64 * PI / 16.0).cos();
            }
        }
        let mut alpha = [1.0f64; 8];
        alpha[0] = std::f64::consts::FRAC_1_SQRT_2;
        Self { cos, alpha }
    }

    /// Forward transform using `method`.
    #[inline]
    pub fn forward(&self, method: DctMethod, block: &[f64; 64]) -> [f64; 64] {
        match method {
            DctMethod::Reference => forward_dct_reference(self, block),
            DctMethod::Fast => forward_dct_fast(block),
        }
    }

    /// Inverse DCT of dequantized coefficients.
    #[inline]
    pub fn inverse(&self, coefficients: &[i32; 64]) -> [f64; 64] {
        inverse_dct(self, coefficients)
    }
}

impl Default for DctTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference forward DCT: each output coefficient is an independent sum
/// over all 64 input samples.
pub fn forward_dct_reference(tables: &DctTables, block: &[f64; 64]) -> [f64; 64] {
    let cos = &tables.cos;
    let mut result = [0.0f64; 64];

    for u in 0..8 {
        for v in 0..8 {
            let mut sum = 0.0f64;
            for x in 0..8 {
                let cx = cos[x][u];
                for y in 0..8 {
                    sum += block[x * 8 + y] * cx * cos[y][v];
                }
            }
            result[u * 8 + v] = 0.25 * tables.alpha[u] * tables.alpha[v] * sum;
        }
    }

    result
}

/// AAN scale factors: `s(0) = 1`, `s(k) = sqrt(2) * cos(k * PI / 16)`.
fn aan_scale() -> [f64; 8] {
    let mut scale = [1.0f64; 8];
    for (k, s) in scale.iter_mut().enumerate().skip(1) {
        *s = std::f64::consts::SQRT_2 * (k as f64 * PI / 16.0).cos();
    }
    scale
}

/// Fast forward DCT (Arai, Agui and Nakajima).
///
/// Two passes of the scaled 8-point butterfly, then one descale per
/// coefficient. Matches [`forward_dct_reference`] to floating-point noise.
pub fn forward_dct_fast(block: &[f64; 64]) -> [f64; 64] {
    let mut data = *block;

    // Rows
    for row in data.chunks_exact_mut(8) {
        let mut line = [0.0f64; 8];
        line.copy_from_slice(row);
        row.copy_from_slice(&aan_1d(&line));
    }

    // Columns
    for col in 0..8 {
        let mut line = [0.0f64; 8];
        for row in 0..8 {
            line[row] = data[row * 8 + col];
        }
        let out = aan_1d(&line);
        for row in 0..8 {
            data[row * 8 + col] = out[row];
        }
    }

    let scale = aan_scale();
    for u in 0..8 {
        for v in 0..8 {
            data[u * 8 + v] /= 8.0 * scale[u] * scale[v];
        }
    }

    data
}

/// Scaled 1-D 8-point AAN transform.
#[inline]
fn aan_1d(d: &[f64; 8]) -> [f64; 8] {
    const C4: f64 = 0.707_106_781_186_547_524; // cos(4 pi/16)
    const C6: f64 = 0.382_683_432_365_089_772; // cos(6 pi/16)
    const C2_MINUS_C6: f64 = 0.541_196_100_146_196_984;
    const C2_PLUS_C6: f64 = 1.306_562_964_876_376_527;

    let tmp0 = d[0] + d[7];
    let tmp7 = d[0] - d[7];
    let tmp1 = d[1] + d[6];
    let tmp6 = d[1] - d[6];
    let tmp2 = d[2] + d[5];
    let tmp5 = d[2] - d[5];
    let tmp3 = d[3] + d[4];
    let tmp4 = d[3] - d[4];

    let mut out = [0.0f64; 8];

    // Even part
    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    out[0] = tmp10 + tmp11;
    out[4] = tmp10 - tmp11;

    let z1 = (tmp12 + tmp13) * C4;
    out[2] = tmp13 + z1;
    out[6] = tmp13 - z1;

    // Odd part
    let tmp10 = tmp4 + tmp5;
    let tmp11 = tmp5 + tmp6;
    let tmp12 = tmp6 + tmp7;

    let z5 = (tmp10 - tmp12) * C6;
    let z2 = C2_MINUS_C6 * tmp10 + z5;
    let z4 = C2_PLUS_C6 * tmp12 + z5;
    let z3 = tmp11 * C4;

    let z11 = tmp7 + z3;
    let z13 = tmp7 - z3;

    out[5] = z13 + z2;
    out[3] = z13 - z2;
    out[1] = z11 + z4;
    out[7] = z11 - z4;

    out
}

/// Inverse DCT of dequantized integer coefficients.
pub fn inverse_dct(tables: &DctTables, coefficients: &[i32; 64]) -> [f64; 64] {
    let cos = &tables.cos;
    let alpha = &tables.alpha;

    // Fold the normalization into the coefficients
    let mut weighted = [0.0f64; 64];
    for u in 0..8 {
        for v in 0..8 {
            weighted[u * 8 + v] = alpha[u] * alpha[v] * coefficients[u * 8 + v] as f64;
        }
    }

    let mut result = [0.0f64; 64];
    for x in 0..8 {
        for y in 0..8 {
            let mut sum = 0.0f64;
            for u in 0..8 {
                let cu = cos[x][u];
                for v in 0..8 {
                    sum += weighted[u * 8 + v] * cu * cos[y][v];
                }
            }
            result[x * 8 + y] = 0.25 * sum;
        }
    }

    result
}
