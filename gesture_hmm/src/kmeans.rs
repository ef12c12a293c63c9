//! Lloyd's k-means with deterministic farthest-point initialisation.
//!
//! The first centroid is the first point; each further centroid is the point
//! farthest from every centroid chosen so far (lowest index on ties). A
//! cluster that ends up with no members gets a NaN centroid, which callers
//! treat as a degenerate fit.

use nalgebra::DVector;

#[derive(Clone, Debug)]
pub struct Clustering {
    pub centroids: Vec<DVector<f64>>,
    /// Cluster index of every input point, in input order.
    pub labels:    Vec<usize>,
}

impl Clustering {
    pub fn k(&self) -> usize { self.centroids.len() }

    pub fn cluster_size(&self, cluster: usize) -> usize {
        self.labels.iter().filter(|l| **l == cluster).count()
    }

    /// Cluster indices ordered by the first point that was assigned to them.
    /// Clusters with no members are left out.
    pub fn first_appearance_order(&self) -> Vec<usize> {
        let mut seen = vec![false; self.k()];
        let mut order = Vec::with_capacity(self.k());
        for &l in &self.labels {
            if !seen[l] {
                seen[l] = true;
                order.push(l);
            }
        }
        order
    }
}

/// Cluster `points` into `k` groups. `None` if `k` is zero or there are
/// fewer points than clusters.
pub fn kmeans(points: &[DVector<f64>], k: usize, max_iterations: usize) -> Option<Clustering> {
    if k == 0 || points.len() < k {
        return None;
    }

    let mut centroids = farthest_point_init(points, k);
    let mut labels = assign(points, &centroids);

    for _ in 0..max_iterations {
        centroids = recompute(points, &labels, k);
        let next = assign(points, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }
    centroids = recompute(points, &labels, k);

    Some(Clustering { centroids, labels })
}

fn dist2(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    (a - b).norm_squared()
}

fn farthest_point_init(points: &[DVector<f64>], k: usize) -> Vec<DVector<f64>> {
    let mut chosen = vec![points[0].clone()];
    while chosen.len() < k {
        let mut best = 0;
        let mut best_d = -1.0;
        for (i, p) in points.iter().enumerate() {
            let d = chosen.iter().map(|c| dist2(p, c)).fold(f64::INFINITY, f64::min);
            if d > best_d {
                best = i;
                best_d = d;
            }
        }
        chosen.push(points[best].clone());
    }
    chosen
}

// Nearest centroid, lowest index on ties; NaN centroids never win.
fn assign(points: &[DVector<f64>], centroids: &[DVector<f64>]) -> Vec<usize> {
    points
        .iter()
        .map(|p| {
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for (j, c) in centroids.iter().enumerate() {
                let d = dist2(p, c);
                if d < best_d {
                    best = j;
                    best_d = d;
                }
            }
            best
        })
        .collect()
}

fn recompute(points: &[DVector<f64>], labels: &[usize], k: usize) -> Vec<DVector<f64>> {
    let d = points[0].len();
    let mut sums = vec![DVector::zeros(d); k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels) {
        sums[l] += p;
        counts[l] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .map(|(s, n)| if n == 0 { DVector::from_element(d, f64::NAN) } else { s / n as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<DVector<f64>> {
        raw.iter().map(|(x, y)| DVector::from_vec(vec![*x, *y])).collect()
    }

    #[test]
    fn separates_two_blobs() {
        let p = pts(&[(0.0, 0.0), (0.1, 0.2), (-0.1, 0.1), (10.0, 10.0), (10.2, 9.9), (9.8, 10.1)]);
        let c = kmeans(&p, 2, 50).unwrap();
        assert_eq!(c.labels[0], c.labels[1]);
        assert_eq!(c.labels[1], c.labels[2]);
        assert_eq!(c.labels[3], c.labels[4]);
        assert_ne!(c.labels[0], c.labels[3]);
        let far = &c.centroids[c.labels[3]];
        assert!((far[0] - 10.0).abs() < 0.2);
    }

    #[test]
    fn deterministic() {
        let p = pts(&[(1.0, 0.0), (2.0, 1.0), (5.0, 5.0), (6.0, 5.0), (9.0, 1.0), (8.0, 0.0)]);
        let a = kmeans(&p, 3, 50).unwrap();
        let b = kmeans(&p, 3, 50).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn constant_data_leaves_empty_clusters() {
        let p = pts(&[(3.0, 3.0); 8]);
        let c = kmeans(&p, 3, 50).unwrap();
        assert!(c.labels.iter().all(|l| *l == 0));
        assert!(c.centroids[1].iter().all(|v| v.is_nan()));
        assert_eq!(c.first_appearance_order(), vec![0]);
    }

    #[test]
    fn first_appearance_follows_time() {
        // Points walk from the far blob back to the origin.
        let p = pts(&[(10.0, 0.0), (10.1, 0.0), (0.0, 0.0), (0.1, 0.0)]);
        let c = kmeans(&p, 2, 50).unwrap();
        let order = c.first_appearance_order();
        assert_eq!(order[0], c.labels[0]);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn too_few_points() {
        assert!(kmeans(&pts(&[(0.0, 0.0)]), 2, 10).is_none());
        assert!(kmeans(&pts(&[(0.0, 0.0)]), 0, 10).is_none());
    }
}
