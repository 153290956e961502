use crate::error::ModelError;
use ndarray::{Array1, Array2};

/// Maximum implicit-shift QR sweeps per singular value before giving up.
const MAX_SWEEPS: usize = 50;

/// Plane rotation `(norm, cos, sin)` that eliminates `h` against `f`. A zero
/// norm, which occurs when the bidiagonal form is rank deficient, yields the
/// identity rotation instead of a 0/0 division.
fn rotation(f: f64, h: f64) -> (f64, f64, f64) {
    let z = (f * f + h * h).sqrt();
    if z == 0.0 { (0.0, 1.0, 0.0) } else { (z, f / z, h / z) }
}

/// Singular value decomposition `a = u * diag(q) * v^T` after Golub and Reinsch.
///
/// Householder bidiagonalization followed by implicit-shift QR on the
/// bidiagonal form, with the classic splitting, cancellation and convergence
/// phases. Requires `m >= n`.
///
/// # Parameters
///
/// - `a` - Input matrix of shape `(m, n)`
///
/// # Returns
///
/// * `Ok((u, q, v))` - `u` of shape `(m, n)` with orthonormal columns, the `n`
///   singular values `q` (non-negative, unsorted), and the orthogonal `(n, n)`
///   matrix `v`
/// * `Err(ModelError::SvdUnderdetermined)` - If `m < n`
/// * `Err(ModelError::ProcessingError)` - If the QR iteration fails to converge
pub fn svd(a: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>, Array2<f64>), ModelError> {
    let (m, n) = a.dim();
    if m < n {
        return Err(ModelError::SvdUnderdetermined { rows: m, cols: n });
    }

    let eps_machine = f64::EPSILON;
    let tol = f64::MIN_POSITIVE / eps_machine;

    let mut u = a.clone();
    let mut v = Array2::<f64>::zeros((n, n));
    let mut q = Array1::<f64>::zeros(n);
    let mut e = vec![0.0_f64; n];

    // Householder reduction to bidiagonal form.
    let mut g = 0.0_f64;
    let mut x = 0.0_f64;
    let mut l = 0_usize;
    for i in 0..n {
        e[i] = g;
        l = i + 1;

        let mut s = 0.0;
        for j in i..m {
            s += u[[j, i]] * u[[j, i]];
        }
        if s < tol {
            g = 0.0;
        } else {
            let f = u[[i, i]];
            g = if f < 0.0 { s.sqrt() } else { -s.sqrt() };
            let h = f * g - s;
            u[[i, i]] = f - g;
            for j in l..n {
                let mut s = 0.0;
                for k in i..m {
                    s += u[[k, i]] * u[[k, j]];
                }
                let f = s / h;
                for k in i..m {
                    u[[k, j]] += f * u[[k, i]];
                }
            }
        }
        q[i] = g;

        let mut s = 0.0;
        for j in l..n {
            s += u[[i, j]] * u[[i, j]];
        }
        if s < tol {
            g = 0.0;
        } else {
            let f = u[[i, i + 1]];
            g = if f < 0.0 { s.sqrt() } else { -s.sqrt() };
            let h = f * g - s;
            u[[i, i + 1]] = f - g;
            for j in l..n {
                e[j] = u[[i, j]] / h;
            }
            for j in l..m {
                let mut s = 0.0;
                for k in l..n {
                    s += u[[j, k]] * u[[i, k]];
                }
                for k in l..n {
                    u[[j, k]] += s * e[k];
                }
            }
        }
        let y = q[i].abs() + e[i].abs();
        if y > x {
            x = y;
        }
    }

    // Accumulation of right-hand transformations.
    for i in (0..n).rev() {
        if g != 0.0 {
            let h = u[[i, i + 1]] * g;
            for j in l..n {
                v[[j, i]] = u[[i, j]] / h;
            }
            for j in l..n {
                let mut s = 0.0;
                for k in l..n {
                    s += u[[i, k]] * v[[k, j]];
                }
                for k in l..n {
                    v[[k, j]] += s * v[[k, i]];
                }
            }
        }
        for j in l..n {
            v[[i, j]] = 0.0;
            v[[j, i]] = 0.0;
        }
        v[[i, i]] = 1.0;
        g = e[i];
        l = i;
    }

    // Accumulation of left-hand transformations.
    for i in (0..n).rev() {
        let l = i + 1;
        let g = q[i];
        for j in l..n {
            u[[i, j]] = 0.0;
        }
        if g != 0.0 {
            let h = u[[i, i]] * g;
            for j in l..n {
                let mut s = 0.0;
                for k in l..m {
                    s += u[[k, i]] * u[[k, j]];
                }
                let f = s / h;
                for k in i..m {
                    u[[k, j]] += f * u[[k, i]];
                }
            }
            for j in i..m {
                u[[j, i]] /= g;
            }
        } else {
            for j in i..m {
                u[[j, i]] = 0.0;
            }
        }
        u[[i, i]] += 1.0;
    }

    // Diagonalization of the bidiagonal form.
    let eps = eps_machine * x;
    for k in (0..n).rev() {
        let mut sweeps = 0;
        loop {
            // Test for splitting.
            let mut l = k;
            let mut cancel = false;
            loop {
                if e[l].abs() <= eps {
                    break;
                }
                if q[l - 1].abs() <= eps {
                    cancel = true;
                    break;
                }
                l -= 1;
            }

            if cancel {
                // Cancellation of e[l] for l > 0.
                let l1 = l - 1;
                let mut c = 0.0;
                let mut s = 1.0;
                for i in l..=k {
                    let f = s * e[i];
                    e[i] *= c;
                    if f.abs() <= eps {
                        break;
                    }
                    let g = q[i];
                    let h = (f * f + g * g).sqrt();
                    q[i] = h;
                    c = g / h;
                    s = -f / h;
                    for j in 0..m {
                        let y = u[[j, l1]];
                        let z = u[[j, i]];
                        u[[j, l1]] = y * c + z * s;
                        u[[j, i]] = -y * s + z * c;
                    }
                }
            }

            // Test for convergence.
            let z = q[k];
            if l == k {
                if z < 0.0 {
                    q[k] = -z;
                    for j in 0..n {
                        v[[j, k]] = -v[[j, k]];
                    }
                }
                break;
            }

            sweeps += 1;
            if sweeps > MAX_SWEEPS {
                return Err(ModelError::ProcessingError(
                    "singular value iteration did not converge".to_string(),
                ));
            }

            // Shift from the bottom 2x2 minor.
            let mut x2 = q[l];
            let y = q[k - 1];
            let g0 = e[k - 1];
            let h = e[k];
            let mut f = ((y - z) * (y + z) + (g0 - h) * (g0 + h)) / (2.0 * h * y);
            let g1 = (f * f + 1.0).sqrt();
            f = ((x2 - z) * (x2 + z)
                + h * (y / (if f < 0.0 { f - g1 } else { f + g1 }) - h))
                / x2;

            // Next QR transformation.
            let mut c = 1.0;
            let mut s = 1.0;
            for i in (l + 1)..=k {
                let mut g = e[i];
                let mut y = q[i];
                let mut h = s * g;
                g *= c;
                let (z0, c0, s0) = rotation(f, h);
                e[i - 1] = z0;
                c = c0;
                s = s0;
                f = x2 * c + g * s;
                g = -x2 * s + g * c;
                h = y * s;
                y *= c;
                for j in 0..n {
                    let xv = v[[j, i - 1]];
                    let zv = v[[j, i]];
                    v[[j, i - 1]] = xv * c + zv * s;
                    v[[j, i]] = -xv * s + zv * c;
                }
                let (z1, c1, s1) = rotation(f, h);
                q[i - 1] = z1;
                c = c1;
                s = s1;
                f = c * g + s * y;
                x2 = -s * g + c * y;
                for j in 0..m {
                    let yu = u[[j, i - 1]];
                    let zu = u[[j, i]];
                    u[[j, i - 1]] = yu * c + zu * s;
                    u[[j, i]] = -yu * s + zu * c;
                }
            }
            e[l] = 0.0;
            e[k] = f;
            q[k] = x2;
        }
    }

    Ok((u, q, v))
}

/// Minimum-norm least-squares solution of `a * x = y` via the SVD,
/// `x = v * diag(1/q) * u^T * y` with near-zero singular values left out
///
/// # Returns
///
/// * `Ok(x)` - Coefficient vector of length `a.ncols()`
/// * `Err(ModelError::SvdUnderdetermined)` - If `a` has fewer rows than columns
/// * `Err(ModelError::InputValidationError)` - If `y` does not match the rows of `a`
pub fn solve_least_squares(a: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    if a.nrows() != y.len() {
        return Err(ModelError::InputValidationError(format!(
            "matrix rows ({}) and right-hand side length ({}) do not match",
            a.nrows(),
            y.len()
        )));
    }
    let (u, q, v) = svd(a)?;

    let q_max = q.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    let cutoff = f64::EPSILON * q_max * a.nrows() as f64;

    // u^T * y, scaled by the inverted singular values
    let mut uty = u.t().dot(y);
    for (i, s) in q.iter().enumerate() {
        if s.abs() > cutoff {
            uty[i] /= s;
        } else {
            uty[i] = 0.0;
        }
    }
    Ok(v.dot(&uty))
}
