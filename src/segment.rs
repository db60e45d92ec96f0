//! Pixel clustering for stored imagery
//!
//! Builds a (row, col, r, g, b) feature vector per pixel and clusters
//! the feature space with either k-means or mean shift. Cluster maps
//! can be rendered back to an image by recoloring every pixel with its
//! cluster's average color.

use crate::error::{DatagenError, Result};
use image::{Rgb, RgbImage};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of feature dimensions per pixel: row, col, r, g, b
pub const FEATURE_DIM: usize = 5;

/// Fraction of the bandwidth below which a mean-shift window is
/// considered converged
const SHIFT_TOLERANCE: f64 = 0.01;

/// Fraction of the bandwidth within which two modes merge into one
/// cluster center
const MERGE_RADIUS: f64 = 0.5;

/// Build the (H*W, 5) feature matrix for an image, each column
/// normalized by its maximum so position and color weigh comparably.
pub fn pixel_features(image: &RgbImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut features = Array2::<f64>::zeros((height as usize * width as usize, FEATURE_DIM));
    for (x, y, pixel) in image.enumerate_pixels() {
        let idx = y as usize * width as usize + x as usize;
        features[[idx, 0]] = f64::from(y);
        features[[idx, 1]] = f64::from(x);
        features[[idx, 2]] = f64::from(pixel[0]);
        features[[idx, 3]] = f64::from(pixel[1]);
        features[[idx, 4]] = f64::from(pixel[2]);
    }
    for mut column in features.axis_iter_mut(Axis(1)) {
        let max = column.iter().fold(0.0_f64, |acc, v| acc.max(*v));
        if max > 0.0 {
            column.mapv_inplace(|v| v / max);
        }
    }
    features
}

fn squared_distance(a: &Array1<f64>, row: ndarray::ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(row.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

fn nearest_center(centers: &[Array1<f64>], row: ndarray::ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let dist = squared_distance(center, row);
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// K-means over pixel features.
///
/// Centroids are seeded by sampling `k` feature rows with a seeded RNG,
/// then assignment and centroid-update steps repeat until assignments
/// stop changing or `max_iters` is reached. Labels range `0..k`.
///
/// # Errors
/// - `k` is zero or exceeds the number of pixels
pub fn kmeans(features: &Array2<f64>, k: usize, seed: u64, max_iters: usize) -> Result<Vec<usize>> {
    let n = features.nrows();
    if k == 0 || k > n {
        return Err(DatagenError::segmentation(format!(
            "Cluster count {} invalid for {} pixels",
            k, n
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers: Vec<Array1<f64>> = Vec::with_capacity(k);
    let mut chosen = std::collections::HashSet::new();
    while centers.len() < k {
        let idx = rng.gen_range(0..n);
        if chosen.insert(idx) {
            centers.push(features.row(idx).to_owned());
        }
    }

    let mut labels = vec![0_usize; n];
    for iter in 0..max_iters {
        let mut changed = false;
        for (i, row) in features.rows().into_iter().enumerate() {
            let nearest = nearest_center(&centers, row);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }
        if !changed && iter > 0 {
            log::debug!("kmeans converged after {} iterations", iter);
            break;
        }

        // Recompute each centroid as the mean of its members; a center
        // that lost all members keeps its previous position.
        for (c, center) in centers.iter_mut().enumerate() {
            let mut sum = Array1::<f64>::zeros(FEATURE_DIM);
            let mut count = 0_usize;
            for (i, row) in features.rows().into_iter().enumerate() {
                if labels[i] == c {
                    sum += &row;
                    count += 1;
                }
            }
            if count > 0 {
                *center = sum / count as f64;
            }
        }
    }
    Ok(labels)
}

/// Mean-shift clustering over pixel features.
///
/// Repeatedly picks an unseen pixel, shifts a bandwidth window to the
/// local mean until the shift falls below 1% of the bandwidth (marking
/// every in-window pixel seen), and keeps the converged mode as a new
/// cluster center unless it lies within half a bandwidth of an existing
/// one. Every pixel is finally assigned to its nearest center.
///
/// # Errors
/// - Non-positive bandwidth
/// - Empty feature matrix
pub fn mean_shift(features: &Array2<f64>, bandwidth: f64, seed: u64) -> Result<Vec<usize>> {
    let n = features.nrows();
    if n == 0 {
        return Err(DatagenError::segmentation("No pixels to cluster"));
    }
    if bandwidth <= 0.0 {
        return Err(DatagenError::segmentation(format!(
            "Bandwidth must be positive, got {}",
            bandwidth
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut unseen: Vec<usize> = (0..n).collect();
    let mut seen = vec![false; n];
    let mut centers: Vec<Array1<f64>> = Vec::new();
    let bandwidth_sq = bandwidth * bandwidth;

    while !unseen.is_empty() {
        let pick = rng.gen_range(0..unseen.len());
        let start = unseen[pick];
        if seen[start] {
            unseen.swap_remove(pick);
            continue;
        }
        seen[start] = true;

        let mut mean = features.row(start).to_owned();
        loop {
            let mut sum = Array1::<f64>::zeros(FEATURE_DIM);
            let mut count = 0_usize;
            for (i, row) in features.rows().into_iter().enumerate() {
                if squared_distance(&mean, row) < bandwidth_sq {
                    seen[i] = true;
                    sum += &row;
                    count += 1;
                }
            }
            // the window always contains its own center pixel
            let next = sum / count.max(1) as f64;
            let shift = (&next - &mean).mapv(|v| v * v).sum().sqrt();
            mean = next;
            if shift < SHIFT_TOLERANCE * bandwidth {
                break;
            }
        }

        let merge_radius_sq = (MERGE_RADIUS * bandwidth) * (MERGE_RADIUS * bandwidth);
        let is_new = centers
            .iter()
            .all(|c| squared_distance(c, mean.view()) >= merge_radius_sq);
        if is_new {
            centers.push(mean);
        }

        unseen.retain(|&i| !seen[i]);
    }

    log::debug!("mean shift found {} clusters", centers.len());
    let labels = features
        .rows()
        .into_iter()
        .map(|row| nearest_center(&centers, row))
        .collect();
    Ok(labels)
}

/// Recolor every pixel with the average color of its cluster.
///
/// # Errors
/// - Label vector length does not match the pixel count
pub fn draw_clusters(image: &RgbImage, labels: &[usize]) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let n = height as usize * width as usize;
    if labels.len() != n {
        return Err(DatagenError::segmentation(format!(
            "Label count {} does not match pixel count {}",
            labels.len(),
            n
        )));
    }
    let cluster_count = labels.iter().max().map_or(0, |m| m + 1);

    let mut sums = vec![[0.0_f64; 3]; cluster_count];
    let mut counts = vec![0_usize; cluster_count];
    for (x, y, pixel) in image.enumerate_pixels() {
        let c = labels[y as usize * width as usize + x as usize];
        for ch in 0..3 {
            sums[c][ch] += f64::from(pixel[ch]);
        }
        counts[c] += 1;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let averages: Vec<Rgb<u8>> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| {
            if count == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([
                    (sum[0] / count as f64).round() as u8,
                    (sum[1] / count as f64).round() as u8,
                    (sum[2] / count as f64).round() as u8,
                ])
            }
        })
        .collect();

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        *pixel = averages[labels[y as usize * width as usize + x as usize]];
    }
    Ok(out)
}
