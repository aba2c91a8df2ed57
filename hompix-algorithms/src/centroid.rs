//! ToT-weighted cluster centroids.

use hompix_core::{ClusterAssignment, ClusterCentroid, HitTable, ProgressCounter, ProgressSink};

#[derive(Clone, Copy, Default)]
struct Accumulator {
    sum_x: f64,
    sum_y: f64,
    weight: f64,
    max_tot: Option<u16>,
    time: f64,
}

/// Reduces every accepted cluster to a [`ClusterCentroid`].
///
/// Position is the ToT-weighted mean of member pixel positions in metres.
/// Time is the arrival time of the member with the largest ToT; the first
/// such member in table order wins ties.
///
/// Returns `None` if the sink requested cancellation.
///
/// # Panics
/// Panics if a cluster has zero total ToT or if the assignment does not
/// label every hit.
#[must_use]
pub fn compute_centroids(
    hits: &HitTable,
    clusters: &ClusterAssignment,
    sink: &dyn ProgressSink,
) -> Option<Vec<ClusterCentroid>> {
    assert_eq!(
        hits.len(),
        clusters.len(),
        "cluster assignment does not cover the hit table"
    );
    sink.status("Calculating centroids");

    let mut acc = vec![Accumulator::default(); clusters.num_clusters() as usize];
    let mut counter = ProgressCounter::new(hits.len() as u64);

    for (i, (hit, &id)) in hits.iter().zip(clusters.ids()).enumerate() {
        if counter.update(i as u64, sink).is_some() && sink.is_cancelled() {
            return None;
        }
        let Some(slot) = (id as usize).checked_sub(1).and_then(|k| acc.get_mut(k)) else {
            continue;
        };
        let w = f64::from(hit.tot);
        slot.sum_x += hit.addr.physical_x() * w;
        slot.sum_y += hit.addr.physical_y() * w;
        slot.weight += w;
        if slot.max_tot.map_or(true, |m| hit.tot > m) {
            slot.max_tot = Some(hit.tot);
            slot.time = hit.time_seconds();
        }
    }
    counter.update(hits.len() as u64, sink);

    let centroids = acc
        .iter()
        .enumerate()
        .map(|(k, a)| {
            assert!(a.weight > 0.0, "cluster {} has zero total ToT", k + 1);
            ClusterCentroid::new(a.sum_x / a.weight, a.sum_y / a.weight, a.time)
        })
        .collect();
    Some(centroids)
}
