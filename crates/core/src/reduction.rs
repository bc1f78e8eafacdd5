//! Three-component projection of token embeddings.
//!
//! Each embedding is normalised to unit length, the set is centred and
//! reduced to its three principal components, and every projected point is
//! pushed back onto the unit sphere so the view keeps a stable scale no
//! matter how spread the window is.
//!
//! The window holds at most a few dozen points, so the decomposition works on
//! the `m × m` Gram matrix of the centred points (cheap regardless of the
//! embedding width) and diagonalises it with cyclic Jacobi rotations.
//!
//! When there is nothing to decompose (fewer than two vectors, identical or
//! collinear points) the projection falls back to the first three normalised
//! dimensions. That path is part of the contract, not an error.

use crate::tokens::TokenRecord;

const COMPONENTS: usize = 3;
const MAX_SWEEPS: usize = 64;
/// Relative eigenvalue floor below which a component is treated as empty.
const RANK_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Pca,
    RawFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPoint {
    pub label: String,
    pub xyz: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub method: Method,
    pub points: Vec<ProjectedPoint>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Project every record with a non-empty embedding. Records without one are
/// skipped, as they have nothing to place.
pub fn project<'a, I>(records: I) -> Projection
where
    I: IntoIterator<Item = &'a TokenRecord>,
{
    let valid: Vec<&TokenRecord> = records
        .into_iter()
        .filter(|r| !r.embedding.is_empty())
        .collect();

    let vectors: Vec<Vec<f64>> = valid.iter().map(|r| unit(&r.embedding)).collect();

    let (method, coords) = match principal_components(&vectors) {
        Some(coords) => (Method::Pca, coords),
        None => (Method::RawFallback, leading_dims(&vectors)),
    };

    let points = valid
        .iter()
        .zip(coords)
        .map(|(r, c)| ProjectedPoint {
            label: r.label(),
            xyz: onto_sphere(c),
        })
        .collect();

    Projection { method, points }
}

/// Unit-normalise, treating non-finite components as zero. A zero vector stays zero.
fn unit(v: &[f32]) -> Vec<f64> {
    let v: Vec<f64> = v
        .iter()
        .map(|&x| if x.is_finite() { x as f64 } else { 0.0 })
        .collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm = if norm > 0.0 { norm } else { 1.0 };
    v.into_iter().map(|x| x / norm).collect()
}

fn leading_dims(vectors: &[Vec<f64>]) -> Vec<[f64; 3]> {
    vectors
        .iter()
        .map(|v| {
            let mut out = [0.0; 3];
            for (o, x) in out.iter_mut().zip(v.iter()) {
                *o = *x;
            }
            out
        })
        .collect()
}

fn onto_sphere(p: [f64; 3]) -> [f32; 3] {
    let n = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
    let n = if n > 0.0 && n.is_finite() { n } else { 1.0 };
    let mut out = [0.0f32; 3];
    for (o, x) in out.iter_mut().zip(p) {
        let v = (x / n) as f32;
        *o = if v.is_finite() { v } else { 0.0 };
    }
    out
}

/// Scores of each point on the first three principal components, or `None`
/// when the input is too small or has fewer than two directions of variance.
fn principal_components(vectors: &[Vec<f64>]) -> Option<Vec<[f64; 3]>> {
    let m = vectors.len();
    if m < 2 {
        return None;
    }
    let d = vectors.iter().map(Vec::len).max().unwrap_or(0);
    if d == 0 {
        return None;
    }

    // Centre (ragged vectors are zero-padded).
    let mut mean = vec![0.0; d];
    for v in vectors {
        for (acc, x) in mean.iter_mut().zip(v) {
            *acc += x;
        }
    }
    for x in mean.iter_mut() {
        *x /= m as f64;
    }
    let centred: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| {
            (0..d)
                .map(|j| v.get(j).copied().unwrap_or(0.0) - mean[j])
                .collect()
        })
        .collect();

    let mut gram = vec![vec![0.0; m]; m];
    for i in 0..m {
        for j in i..m {
            let dot: f64 = centred[i].iter().zip(&centred[j]).map(|(a, b)| a * b).sum();
            gram[i][j] = dot;
            gram[j][i] = dot;
        }
    }

    let (values, vectors_u) = jacobi_eigen(gram);

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));

    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let floor = total * RANK_EPS;
    let rank = order.iter().filter(|&&k| values[k] > floor).count();
    if rank < 2 {
        return None;
    }

    let mut coords = vec![[0.0; 3]; m];
    for (c, &k) in order.iter().take(COMPONENTS).enumerate() {
        let lambda = values[k];
        if lambda <= floor {
            continue;
        }
        let scale = lambda.sqrt();
        let col: Vec<f64> = (0..m).map(|i| vectors_u[i][k]).collect();
        // Fix the sign so identical input always yields identical output.
        let pivot = col
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(0.0);
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for (i, row) in coords.iter_mut().enumerate() {
            row[c] = sign * col[i] * scale;
        }
    }

    if coords.iter().flatten().all(|x| x.is_finite()) {
        Some(coords)
    } else {
        None
    }
}

/// Cyclic Jacobi diagonalisation of a symmetric matrix. Returns the
/// eigenvalues and the eigenvectors as the columns of the second matrix.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[p][q] * a[p][q];
            }
        }
        if off <= scale * 1e-24 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i][i]).collect();
    (values, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u32, v: Vec<f32>) -> TokenRecord {
        TokenRecord::new(format!("t{id}"), id, v, None)
    }

    fn assert_on_sphere(p: &Projection) {
        for pt in &p.points {
            assert!(pt.xyz.iter().all(|x| x.is_finite()));
            let n: f32 = pt.xyz.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!(n == 0.0 || (n - 1.0).abs() < 1e-4, "norm {n}");
        }
    }

    #[test]
    fn single_vector_uses_the_raw_fallback() {
        let records = [rec(1, vec![3.0, 4.0, 0.0, 9.0])];
        let p = project(&records);
        assert_eq!(p.method, Method::RawFallback);
        assert_eq!(p.points.len(), 1);
        assert_eq!(p.points[0].label, "t1 (1)");
        assert_on_sphere(&p);
    }

    #[test]
    fn short_vectors_are_zero_padded_in_the_fallback() {
        let records = [rec(1, vec![2.0])];
        let p = project(&records);
        assert_eq!(p.points[0].xyz, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn identical_vectors_fall_back() {
        let records = [rec(1, vec![1.0, 2.0, 3.0]), rec(2, vec![2.0, 4.0, 6.0])];
        let p = project(&records);
        assert_eq!(p.method, Method::RawFallback);
        assert_on_sphere(&p);
    }

    #[test]
    fn empty_and_missing_embeddings_are_skipped() {
        let records = [rec(1, vec![]), rec(2, vec![])];
        let p = project(&records);
        assert!(p.is_empty());
    }

    #[test]
    fn non_finite_input_never_leaks() {
        let records = [
            rec(1, vec![f32::NAN, 1.0, 0.0]),
            rec(2, vec![0.0, f32::INFINITY, 1.0]),
            rec(3, vec![1.0, 0.0, 0.0]),
        ];
        let p = project(&records);
        assert_eq!(p.points.len(), 3);
        assert_on_sphere(&p);
    }

    #[test]
    fn spread_points_use_pca_and_land_on_the_sphere() {
        let records: Vec<TokenRecord> = (0..12u32)
            .map(|i| {
                let a = i as f32 * 0.5;
                rec(i, vec![a.cos(), a.sin(), (a * 0.3).cos(), 0.1 * a, 1.0])
            })
            .collect();
        let p = project(&records);
        assert_eq!(p.method, Method::Pca);
        assert_eq!(p.points.len(), 12);
        assert_on_sphere(&p);
    }

    #[test]
    fn pca_separates_the_dominant_axis() {
        // Wide spread along x, narrow along y, nothing along z.
        let records = [
            rec(1, vec![1.0, 0.2, 0.0]),
            rec(2, vec![-1.0, 0.2, 0.0]),
            rec(3, vec![1.0, -0.2, 0.0]),
            rec(4, vec![-1.0, -0.2, 0.0]),
        ];
        let p = project(&records);
        assert_eq!(p.method, Method::Pca);
        let a = p.points[0].xyz;
        let b = p.points[1].xyz;
        assert!(a[0] * b[0] < 0.0);
        assert!(a[0].abs() > a[1].abs());
        assert!(a[2].abs() < 1e-4);
    }

    #[test]
    fn jacobi_recovers_known_eigenvalues() {
        let (mut values, _) = jacobi_eigen(vec![
            vec![2.0, 1.0, 0.0],
            vec![1.0, 2.0, 0.0],
            vec![0.0, 0.0, 5.0],
        ]);
        values.sort_by(|a, b| a.total_cmp(b));
        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
        assert!((values[2] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn projection_is_deterministic() {
        let records: Vec<TokenRecord> = (0..6u32)
            .map(|i| rec(i, vec![i as f32, (i * i) as f32, 1.0, -(i as f32)]))
            .collect();
        assert_eq!(project(&records), project(&records));
    }
}
