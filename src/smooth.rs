//! Savitzky-Golay smoothing: a least-squares polynomial of degree
//! `POLYORDER` is fitted around every sample and evaluated at it.
//! Near the edges, where no symmetric window exists, the polynomial
//! fitted to the first (last) full window is evaluated instead.

/// Degree of the fitted polynomial.
pub const POLYORDER: usize = 3;

/// Window used when the series is long enough.
pub const DEFAULT_WINDOW: usize = 101;

/// `DEFAULT_WINDOW`, or the largest odd window that fits into `len`.
pub fn window_for_len(len: usize) -> usize {
    let w = DEFAULT_WINDOW.min(len);
    if w % 2 == 0 {
        w.saturating_sub(1)
    } else {
        w
    }
}

/// Smoothed copy of `values` with the window from
/// `window_for_len`. Series too short to fit the polynomial (window
/// not larger than `POLYORDER`) are returned unchanged. NaN inputs
/// propagate to every output whose window contains them.
pub fn smooth(values: &[f64]) -> Vec<f64> {
    savgol(values, window_for_len(values.len()), POLYORDER)
}

/// `window` must be odd.
pub fn savgol(values: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let len = values.len();
    if window <= polyorder || window > len || window % 2 == 0 {
        return values.to_vec();
    }
    let half = window / 2;
    let Some(projection) = Projection::new(window, polyorder) else {
        return values.to_vec();
    };

    let center = projection.coefficients(0.);
    let mut out = Vec::with_capacity(len);

    let head = &values[..window];
    for i in 0..half {
        out.push(dot(&projection.coefficients(i as f64 - half as f64), head));
    }
    for i in half..len - half {
        out.push(dot(&center, &values[i - half..=i + half]));
    }
    let tail = &values[len - window..];
    for i in len - half..len {
        let x0 = (i - (len - window)) as f64 - half as f64;
        out.push(dot(&projection.coefficients(x0), tail));
    }
    out
}

fn dot(coefficients: &[f64], values: &[f64]) -> f64 {
    coefficients.iter().zip(values).map(|(c, v)| c * v).sum()
}

/// The least-squares projection `(AᵀA)⁻¹Aᵀ` for a window, with the
/// positions scaled to `[-1, 1]` to keep the normal equations well
/// conditioned.
struct Projection {
    half: f64,
    /// `(polyorder + 1) x window`
    rows: Vec<Vec<f64>>,
}

impl Projection {
    fn new(window: usize, polyorder: usize) -> Option<Self> {
        let half = (window / 2) as f64;
        let order = polyorder + 1;
        let positions: Vec<f64> = (0..window).map(|i| (i as f64 - half) / half).collect();
        // A: window x order
        let a: Vec<Vec<f64>> = positions
            .iter()
            .map(|x| (0..order).map(|j| x.powi(j as i32)).collect())
            .collect();
        let mut ata = vec![vec![0.; order]; order];
        for (j, row) in ata.iter_mut().enumerate() {
            for (k, cell) in row.iter_mut().enumerate() {
                *cell = a.iter().map(|r| r[j] * r[k]).sum();
            }
        }
        let inverse = invert(ata)?;
        let rows: Vec<Vec<f64>> = (0..order)
            .map(|j| {
                (0..window)
                    .map(|i| (0..order).map(|k| inverse[j][k] * a[i][k]).sum::<f64>())
                    .collect()
            })
            .collect();
        Some(Self { half, rows })
    }

    /// Weights that evaluate the fitted polynomial at `x0` (window
    /// position relative to its centre, unscaled).
    fn coefficients(&self, x0: f64) -> Vec<f64> {
        let u = x0 / self.half;
        let mut out = vec![0.; self.rows[0].len()];
        let mut power = 1.;
        for row in &self.rows {
            for (o, r) in out.iter_mut().zip(row) {
                *o += power * r;
            }
            power *= u;
        }
        out
    }
}

/// Gauss-Jordan elimination with partial pivoting; `None` if
/// singular.
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1. } else { 0. }).collect())
        .collect();
    for col in 0..n {
        let pivot = (col..n).max_by(|a, b| m[*a][col].abs().total_cmp(&m[*b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        inv.swap(col, pivot);
        let p = m[col][col];
        for k in 0..n {
            m[col][k] /= p;
            inv[col][k] /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = m[row][col];
                if factor != 0. {
                    for k in 0..n {
                        m[row][k] -= factor * m[col][k];
                        inv[row][k] -= factor * inv[col][k];
                    }
                }
            }
        }
    }
    Some(inv)
}
