use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ClusterConfig;
use crate::error::{RoleError, RoleResult};
use crate::events::PlayerInfo;
use crate::profile::{Metric, PlayerSample, Profile};

#[derive(Debug, Clone, Serialize)]
pub struct ClusterTemplate {
    /// Positional key (`role_0`, `role_1`, ...) until the namer assigns a name.
    pub key: String,
    pub player_ids: Vec<u64>,
    pub template: Profile,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSeparation {
    pub metric: Metric,
    /// `None` when within-cluster variance is zero or there are too few players.
    pub f_statistic: Option<f64>,
    pub eta_squared: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionClusters {
    pub position: String,
    pub population: usize,
    pub k: usize,
    pub inertia: Option<f64>,
    pub clusters: Vec<ClusterTemplate>,
    pub separation: Vec<MetricSeparation>,
}

/// Distinct players per position label in the event data.
pub fn position_population(directory: &BTreeMap<u64, PlayerInfo>) -> BTreeMap<String, usize> {
    let mut out = BTreeMap::new();
    for info in directory.values() {
        if let Some(pos) = info.position.as_deref() {
            *out.entry(pos.to_string()).or_insert(0) += 1;
        }
    }
    out
}

pub fn choose_k(population: usize, cfg: &ClusterConfig) -> usize {
    if population >= cfg.three_cluster_min {
        3
    } else if population >= cfg.two_cluster_min {
        2
    } else {
        1
    }
}

#[derive(Debug, Clone)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let dims = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; dims];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut stds = vec![0.0; dims];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in &mut stds {
            *s = s.sqrt();
        }
        Self { means, stds }
    }

    /// Zero-variance features map to 0.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| if *s > 0.0 { (v - m) / s } else { 0.0 })
            .collect()
    }
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, c) in centroids.iter().enumerate() {
        let d = sq_dist(point, c);
        if d < best.1 {
            best = (idx, d);
        }
    }
    best
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
}

fn seed_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())].clone()];
    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(p, &centroids).1).collect();
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            let mut pick = points.len() - 1;
            for (idx, w) in weights.iter().enumerate() {
                if target < *w {
                    pick = idx;
                    break;
                }
                target -= w;
            }
            pick
        } else {
            rng.gen_range(0..points.len())
        };
        centroids.push(points[next].clone());
    }
    centroids
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (label, p) in labels.iter_mut().zip(points) {
        let (idx, d) = nearest(p, centroids);
        *label = idx;
        inertia += d;
    }
    inertia
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, cfg: &ClusterConfig) -> KMeansFit {
    let k = centroids.len();
    let dims = points[0].len();
    let mut labels = vec![0usize; points.len()];
    let mut iterations = 0;

    for _ in 0..cfg.max_iterations {
        iterations += 1;
        assign(points, &centroids, &mut labels);

        let mut next = vec![vec![0.0; dims]; k];
        let mut counts = vec![0usize; k];
        for (p, label) in points.iter().zip(&labels) {
            counts[*label] += 1;
            for (acc, v) in next[*label].iter_mut().zip(p) {
                *acc += v;
            }
        }
        let mut taken = Vec::new();
        for c in 0..k {
            if counts[c] > 0 {
                for acc in &mut next[c] {
                    *acc /= counts[c] as f64;
                }
                continue;
            }
            // empty cluster: reseed with the point farthest from its centroid
            let far = points
                .iter()
                .enumerate()
                .filter(|(idx, _)| !taken.contains(idx))
                .map(|(idx, p)| (idx, sq_dist(p, &centroids[labels[idx]])))
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(idx, _)| idx);
            if let Some(idx) = far {
                taken.push(idx);
                next[c] = points[idx].clone();
            }
        }

        let shift = centroids
            .iter()
            .zip(&next)
            .map(|(a, b)| sq_dist(a, b).sqrt())
            .fold(0.0, f64::max);
        centroids = next;
        if shift <= cfg.tolerance {
            break;
        }
    }

    let inertia = assign(points, &centroids, &mut labels);
    KMeansFit {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// Best of `cfg.restarts` seeded runs by inertia; the first run wins ties.
pub fn kmeans(points: &[Vec<f64>], k: usize, cfg: &ClusterConfig) -> Option<KMeansFit> {
    if k == 0 || points.len() < k {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut best: Option<KMeansFit> = None;
    for restart in 0..cfg.restarts.max(1) {
        let fit = lloyd(points, seed_centroids(points, k, &mut rng), cfg);
        debug!(restart, inertia = fit.inertia, iterations = fit.iterations, "k-means run");
        if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best
}

/// One-way ANOVA per metric across cluster labels, on unscaled values.
pub fn separation(samples: &[&PlayerSample], labels: &[usize], k: usize) -> Vec<MetricSeparation> {
    let n = samples.len();
    Metric::ALL
        .iter()
        .map(|metric| {
            let values: Vec<f64> = samples
                .iter()
                .map(|s| s.profile.value_or(*metric, 0.0))
                .collect();
            let grand = values.iter().sum::<f64>() / n.max(1) as f64;
            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (v, l) in values.iter().zip(labels) {
                sums[*l] += v;
                counts[*l] += 1;
            }
            let group_means: Vec<f64> = sums
                .iter()
                .zip(&counts)
                .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
                .collect();
            let ss_between: f64 = group_means
                .iter()
                .zip(&counts)
                .map(|(m, c)| *c as f64 * (m - grand).powi(2))
                .sum();
            let ss_within: f64 = values
                .iter()
                .zip(labels)
                .map(|(v, l)| (v - group_means[*l]).powi(2))
                .sum();
            let ss_total = ss_between + ss_within;
            let groups = counts.iter().filter(|c| **c > 0).count();
            let f_statistic = if groups > 1 && n > groups && ss_within > 0.0 {
                Some((ss_between / (groups - 1) as f64) / (ss_within / (n - groups) as f64))
            } else {
                None
            };
            MetricSeparation {
                metric: *metric,
                f_statistic,
                eta_squared: if ss_total > 0.0 { ss_between / ss_total } else { 0.0 },
            }
        })
        .collect()
}

pub fn cluster_position(
    position: &str,
    population: usize,
    samples: &[&PlayerSample],
    cfg: &ClusterConfig,
) -> RoleResult<PositionClusters> {
    if population < cfg.min_position_players {
        return Err(RoleError::insufficient_players(
            population,
            cfg.min_position_players,
        ));
    }
    if samples.is_empty() {
        return Err(RoleError::insufficient_players(0, 1));
    }
    let eligible: Vec<&PlayerSample> = samples
        .iter()
        .copied()
        .filter(|s| s.events() >= cfg.cluster_min_events)
        .collect();

    // The average template covers every profiled player, not only the clustering pool.
    let k = choose_k(population, cfg);
    if k == 1 || eligible.len() < k {
        debug!(position, k, eligible = eligible.len(), "using a single average template");
        return Ok(PositionClusters {
            position: position.to_string(),
            population,
            k: 1,
            inertia: None,
            clusters: vec![ClusterTemplate {
                key: "role_0".to_string(),
                player_ids: samples.iter().map(|s| s.player_id()).collect(),
                template: Profile::mean(samples.iter().map(|s| &s.profile)),
            }],
            separation: Vec::new(),
        });
    }

    let raw: Vec<Vec<f64>> = eligible.iter().map(|s| s.profile.to_vector().0).collect();
    let scaler = Standardizer::fit(&raw);
    let scaled: Vec<Vec<f64>> = raw.iter().map(|r| scaler.transform(r)).collect();
    let fit = kmeans(&scaled, k, cfg).ok_or_else(|| {
        RoleError::insufficient_players(eligible.len(), k)
    })?;

    let clusters = (0..k)
        .filter_map(|c| {
            let members: Vec<&PlayerSample> = eligible
                .iter()
                .zip(&fit.labels)
                .filter(|(_, l)| **l == c)
                .map(|(s, _)| *s)
                .collect();
            if members.is_empty() {
                return None;
            }
            Some(ClusterTemplate {
                key: format!("role_{c}"),
                player_ids: members.iter().map(|s| s.player_id()).collect(),
                template: Profile::mean(members.iter().map(|s| &s.profile)),
            })
        })
        .collect();

    Ok(PositionClusters {
        position: position.to_string(),
        population,
        k,
        inertia: Some(fit.inertia),
        clusters,
        separation: separation(&eligible, &fit.labels, k),
    })
}

pub fn cluster_all(
    samples: &[PlayerSample],
    population: &BTreeMap<String, usize>,
    cfg: &ClusterConfig,
) -> Vec<PositionClusters> {
    let mut by_position: BTreeMap<&str, Vec<&PlayerSample>> = BTreeMap::new();
    for sample in samples {
        if let Some(pos) = sample.position() {
            by_position.entry(pos).or_default().push(sample);
        }
    }

    let mut out = Vec::new();
    for (position, count) in population {
        let members = by_position.get(position.as_str()).cloned().unwrap_or_default();
        match cluster_position(position, *count, &members, cfg) {
            Ok(clusters) => {
                info!(
                    position = %position,
                    population = count,
                    k = clusters.k,
                    roles = clusters.clusters.len(),
                    "clustered position"
                );
                out.push(clusters);
            }
            Err(err) => debug!(position = %position, %err, "skipping position"),
        }
    }
    out
}
