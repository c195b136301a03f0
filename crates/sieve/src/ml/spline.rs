//! Penalized logistic regression on a natural cubic spline
//!
//! Given `y[i]` decoys out of `m[i]` PSMs in a score bin centred at `x[i]`,
//! fit the log-odds `g(x)` that a PSM with score `x` is a decoy by maximizing
//! the penalized binomial likelihood `l(g) - α/2 ∫ g''(x)² dx`.
//!
//! The likelihood is maximized with iteratively reweighted least squares,
//! where every weighted least squares step is solved with the Reinsch
//! algorithm in O(n). The smoothing parameter α is chosen by minimizing the
//! leave-one-out cross-validation score, using a golden section search.
//!
//! Green & Silverman, 1994 "Nonparametric Regression and Generalized Linear Models"
//! Käll, 2008 [https://doi.org/10.1093/bioinformatics/btm615]

/// Maps a score onto the log-odds that a PSM with that score is incorrect
pub trait LogOddsModel {
    fn log_odds(&self, score: f64) -> f64;
}

/// Working responses are clamped to this range of log-odds
const G_RANGE: f64 = 35.0;
const EPSILON: f64 = 1E-15;
/// Convergence of a single IRLS fit (mean absolute change in g)
const STEP_EPSILON: f64 = 1E-5;
const MAX_IRLS_STEPS: usize = 10;
/// Relative change in CV score at which the search for α stops
const CONVERGE_EPSILON: f64 = 1E-2;
const MAX_ALPHA_ROUNDS: usize = 25;
/// Inverse of the golden ratio
const TAU: f64 = 0.618_033_988_749_894_8;

/// Symmetric pentadiagonal matrix, stored by diagonals:
/// `k0[i] = A[i,i]`, `k1[i] = A[i,i+1]`, `k2[i] = A[i,i+2]`
#[derive(Clone, Debug, PartialEq)]
struct Band {
    k0: Vec<f64>,
    k1: Vec<f64>,
    k2: Vec<f64>,
}

/// `A = L D Lᵀ`, with unit lower triangular `L`:
/// `l1[i] = L[i+1,i]`, `l2[i] = L[i+2,i]`
#[derive(Clone, Debug)]
struct Ldl {
    d: Vec<f64>,
    l1: Vec<f64>,
    l2: Vec<f64>,
}

impl Band {
    fn len(&self) -> usize {
        self.k0.len()
    }

    fn factor(&self) -> Ldl {
        let n = self.len();
        let mut d = vec![0.0; n];
        let mut l1 = vec![0.0; n];
        let mut l2 = vec![0.0; n];
        for i in 0..n {
            d[i] = self.k0[i];
            if i >= 1 {
                d[i] -= l1[i - 1] * l1[i - 1] * d[i - 1];
            }
            if i >= 2 {
                d[i] -= l2[i - 2] * l2[i - 2] * d[i - 2];
            }
            if i + 1 < n {
                let mut k1 = self.k1[i];
                if i >= 1 {
                    k1 -= l1[i - 1] * l2[i - 1] * d[i - 1];
                }
                l1[i] = k1 / d[i];
            }
            if i + 2 < n {
                l2[i] = self.k2[i] / d[i];
            }
        }
        Ldl { d, l1, l2 }
    }
}

impl Ldl {
    fn solve(&self, mut x: Vec<f64>) -> Vec<f64> {
        let n = self.d.len();
        for i in 0..n {
            if i >= 1 {
                x[i] -= self.l1[i - 1] * x[i - 1];
            }
            if i >= 2 {
                x[i] -= self.l2[i - 2] * x[i - 2];
            }
        }
        for i in 0..n {
            x[i] /= self.d[i];
        }
        for i in (0..n).rev() {
            if i + 1 < n {
                x[i] -= self.l1[i] * x[i + 1];
            }
            if i + 2 < n {
                x[i] -= self.l2[i] * x[i + 2];
            }
        }
        x
    }

    /// Central band of the inverse matrix (Hutchinson & de Hoog, 1985)
    fn inverse_band(&self) -> Band {
        let n = self.d.len();
        let mut b0 = vec![0.0; n];
        let mut b1 = vec![0.0; n];
        let mut b2 = vec![0.0; n];
        for i in (0..n).rev() {
            let (l1, l2) = (self.l1[i], self.l2[i]);
            if i + 2 < n {
                b2[i] = -l1 * b1[i + 1] - l2 * b0[i + 2];
            }
            if i + 1 < n {
                b1[i] = -l1 * b0[i + 1] - l2 * b1[i + 1];
            }
            b0[i] = 1.0 / self.d[i] - l1 * b1[i] - l2 * b2[i];
        }
        Band {
            k0: b0,
            k1: b1,
            k2: b2,
        }
    }
}

/// Knot geometry of a natural cubic spline.
///
/// `Q` is the `n x (n-2)` tridiagonal matrix linking values and second
/// derivatives; column `j` has entries at rows `j`, `j+1` and `j+2`, stored in
/// `q[j]`. `R` is the `(n-2) x (n-2)` tridiagonal matrix of the roughness
/// penalty.
#[derive(Clone, Debug)]
struct Knots {
    x: Vec<f64>,
    q: Vec<[f64; 3]>,
    r: Band,
}

impl Knots {
    fn new(x: Vec<f64>) -> Self {
        let h = x.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();
        let m = x.len().saturating_sub(2);
        let q = (0..m)
            .map(|j| [1.0 / h[j], -1.0 / h[j] - 1.0 / h[j + 1], 1.0 / h[j + 1]])
            .collect();
        let r = Band {
            k0: (0..m).map(|j| (h[j] + h[j + 1]) / 3.0).collect(),
            k1: (0..m)
                .map(|j| if j + 1 < m { h[j + 1] / 6.0 } else { 0.0 })
                .collect(),
            k2: vec![0.0; m],
        };
        Knots { x, q, r }
    }

    fn len(&self) -> usize {
        self.x.len()
    }

    /// Columns of `Q` with a non-zero entry in row `i`
    fn columns(&self, i: usize) -> std::ops::Range<usize> {
        i.saturating_sub(2)..(i + 1).min(self.q.len())
    }

    fn qt_dot(&self, v: &[f64]) -> Vec<f64> {
        self.q
            .iter()
            .enumerate()
            .map(|(j, c)| c[0] * v[j] + c[1] * v[j + 1] + c[2] * v[j + 2])
            .collect()
    }

    fn q_dot(&self, gamma: &[f64]) -> Vec<f64> {
        (0..self.len())
            .map(|i| {
                self.columns(i)
                    .map(|j| self.q[j][i - j] * gamma[j])
                    .sum::<f64>()
            })
            .collect()
    }

    /// `R + α Qᵀ W⁻¹ Q`
    fn system(&self, alpha: f64, w: &[f64]) -> Band {
        let m = self.q.len();
        let mut band = self.r.clone();
        for j in 0..m {
            for offset in 0..3 {
                let k = j + offset;
                if k >= m {
                    break;
                }
                // Rows shared by columns j and k
                let sum = (k..=j + 2)
                    .map(|i| self.q[j][i - j] * self.q[k][i - k] / w[i])
                    .sum::<f64>();
                let diag = match offset {
                    0 => &mut band.k0,
                    1 => &mut band.k1,
                    _ => &mut band.k2,
                };
                diag[j] += alpha * sum;
            }
        }
        band
    }

    /// Weighted penalized least squares fit of `z`: returns the fitted values
    /// `g`, the second derivatives at the interior knots, and the factored
    /// system matrix
    fn smooth(&self, alpha: f64, z: &[f64], w: &[f64]) -> (Vec<f64>, Vec<f64>, Ldl) {
        let ldl = self.system(alpha, w).factor();
        let gamma = ldl.solve(self.qt_dot(z));
        let g = self
            .q_dot(&gamma)
            .into_iter()
            .zip(z.iter().zip(w))
            .map(|(qg, (z, w))| z - alpha * qg / w)
            .collect();
        (g, gamma, ldl)
    }

    /// Leave-one-out cross-validation score of the fit with parameter `alpha`
    fn cross_validation(&self, alpha: f64, z: &[f64], w: &[f64]) -> f64 {
        let (g, _, ldl) = self.smooth(alpha, z, w);
        let inv = ldl.inverse_band();
        let sigma = |j: usize, k: usize| {
            let (lo, hi) = (j.min(k), j.max(k));
            match hi - lo {
                0 => inv.k0[lo],
                1 => inv.k1[lo],
                _ => inv.k2[lo],
            }
        };

        let n = self.len();
        let mut cv = 0.0;
        for i in 0..n {
            // a[i] = (Q Σ Qᵀ)[i,i], so that 1 - A[i,i] = α a[i] / w[i]
            let mut a = 0.0;
            for j in self.columns(i) {
                for k in self.columns(i) {
                    a += self.q[j][i - j] * sigma(j, k) * self.q[k][i - k];
                }
            }
            let residual = (z[i] - g[i]) * w[i] / (alpha * a);
            cv += w[i] * residual * residual;
        }
        cv / n as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogisticSpline {
    x: Vec<f64>,
    g: Vec<f64>,
    /// Second derivatives at every knot (zero at both ends)
    gamma: Vec<f64>,
    alpha: f64,
}

/// Working weights and responses of one IRLS step
fn working(g: &[f64], y: &[f64], m: &[f64]) -> (Vec<f64>, Vec<f64>) {
    g.iter()
        .zip(y.iter().zip(m))
        .map(|(&g, (&y, &m))| {
            let p = (1.0 / (1.0 + (-g).exp())).clamp(EPSILON, 1.0 - EPSILON);
            let w = (m * p * (1.0 - p)).max(EPSILON);
            let z = (g + (y - p * m) / w).clamp(-G_RANGE, G_RANGE);
            (z, w)
        })
        .unzip()
}

/// Minimize `f(-ln p)` for `p` in (0, 1), returning the best `(α, f(α))`
fn golden_section<F: Fn(f64) -> f64>(f: F) -> (f64, f64) {
    let f = |p: f64| {
        let v = f(-p.ln());
        if v.is_finite() {
            v
        } else {
            f64::MAX
        }
    };
    let (mut lo, mut hi) = (0.0, 1.0);
    let mut p1 = hi - TAU * (hi - lo);
    let mut p2 = lo + TAU * (hi - lo);
    let (mut f1, mut f2) = (f(p1), f(p2));
    while hi - lo > 1E-4 {
        if f1 > f2 {
            lo = p1;
            p1 = p2;
            f1 = f2;
            p2 = lo + TAU * (hi - lo);
            f2 = f(p2);
        } else {
            hi = p2;
            p2 = p1;
            f2 = f1;
            p1 = hi - TAU * (hi - lo);
            f1 = f(p1);
        }
    }
    match f1 <= f2 {
        true => (-p1.ln(), f1),
        false => (-p2.ln(), f2),
    }
}

impl LogisticSpline {
    /// Fit the spline to `y[i]` positive outcomes out of `m[i]` trials at
    /// abscissa `x[i]`. `x` must be sorted in ascending order; repeated
    /// abscissae are pooled.
    pub fn fit(x: &[f64], y: &[f64], m: &[f64]) -> Self {
        assert!(
            x.len() == y.len() && x.len() == m.len(),
            "x, y and m must have equal length"
        );

        // Pool repeated abscissae, and drop empty bins
        let mut xs: Vec<f64> = Vec::with_capacity(x.len());
        let mut ys: Vec<f64> = Vec::with_capacity(x.len());
        let mut ms: Vec<f64> = Vec::with_capacity(x.len());
        for ((&x, &y), &m) in x.iter().zip(y).zip(m) {
            if m <= 0.0 {
                continue;
            }
            match xs.last() {
                Some(&last) if last >= x => {
                    if let (Some(ly), Some(lm)) = (ys.last_mut(), ms.last_mut()) {
                        *ly += y;
                        *lm += m;
                    }
                }
                _ => {
                    xs.push(x);
                    ys.push(y);
                    ms.push(m);
                }
            }
        }

        let mut g = ys
            .iter()
            .zip(&ms)
            .map(|(y, m)| {
                let p = (y + 0.05) / (m + 0.1);
                (p / (1.0 - p)).ln()
            })
            .collect::<Vec<_>>();

        let n = xs.len();
        if n < 3 {
            log::trace!("- {} bins: interpolating raw log-odds", n);
            return LogisticSpline {
                gamma: vec![0.0; n],
                x: xs,
                g,
                alpha: 0.0,
            };
        }

        let knots = Knots::new(xs);
        let irls = |alpha: f64, g: &mut Vec<f64>| {
            let mut gamma = vec![0.0; n - 2];
            for _ in 0..MAX_IRLS_STEPS {
                let (z, w) = working(g, &ys, &ms);
                let (g_new, gamma_new, _) = knots.smooth(alpha, &z, &w);
                let step = g
                    .iter()
                    .zip(&g_new)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
                    / n as f64;
                *g = g_new;
                gamma = gamma_new;
                if step <= STEP_EPSILON {
                    break;
                }
            }
            gamma
        };

        let mut alpha = 1.0;
        let mut cv = 1E100;
        let mut wrong_direction = 0;
        let mut gamma = irls(alpha, &mut g);
        for _ in 0..MAX_ALPHA_ROUNDS {
            let (z, w) = working(&g, &ys, &ms);
            let (best_alpha, best_cv) =
                golden_section(|alpha| knots.cross_validation(alpha, &z, &w));
            log::trace!("- alpha = {:e}, cv = {:e}", best_alpha, best_cv);

            let diverging = best_cv > cv && {
                wrong_direction += 1;
                wrong_direction <= 3
            };
            if (cv - best_cv) / cv < CONVERGE_EPSILON && !diverging {
                break;
            }
            cv = best_cv;
            alpha = best_alpha;
            gamma = irls(alpha, &mut g);
        }
        log::trace!("- smoothing parameter alpha = {:e}", alpha);

        let mut full = Vec::with_capacity(n);
        full.push(0.0);
        full.extend(gamma);
        full.push(0.0);

        LogisticSpline {
            x: knots.x,
            g,
            gamma: full,
            alpha,
        }
    }

    /// Selected roughness penalty
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fitted log-odds at the knots
    pub fn knots(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.g.iter().copied())
    }
}

impl LogOddsModel for LogisticSpline {
    fn log_odds(&self, score: f64) -> f64 {
        let (x, g, gamma) = (&self.x, &self.g, &self.gamma);
        let n = x.len();
        match n {
            0 => return 0.0,
            1 => return g[0],
            _ => {}
        }

        let right = x.partition_point(|&k| k < score);
        if right == n {
            // Linear extrapolation with the slope at the last knot
            let h = x[n - 1] - x[n - 2];
            let slope = (g[n - 1] - g[n - 2]) / h + h / 6.0 * gamma[n - 2];
            return g[n - 1] + (score - x[n - 1]) * slope;
        }
        if x[right] == score {
            return g[right];
        }
        if right == 0 {
            let h = x[1] - x[0];
            let slope = (g[1] - g[0]) / h - h / 6.0 * gamma[1];
            return g[0] - (x[0] - score) * slope;
        }

        let left = right - 1;
        let h = x[right] - x[left];
        let dl = score - x[left];
        let dr = x[right] - score;
        (dl * g[right] + dr * g[left]) / h
            - dl * dr / 6.0 * ((1.0 + dl / h) * gamma[right] + (1.0 + dr / h) * gamma[left])
    }
}
