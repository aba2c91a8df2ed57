//! Greedy time-window coincidence search over centroids.

use hompix_core::{
    ClusterCentroid, CoincidenceNFold, CoincidencePair, Coincidences, ProgressCounter,
    ProgressSink,
};

/// Groups centroids whose times lie within `window` seconds of a group start.
///
/// Centroids are scanned in time order (stable for equal times). From each
/// start the group extends while `time - start_time <= window`; one extra
/// centroid makes a pair, more make an n-fold, and a lone centroid is skipped.
/// Every centroid lands in at most one group.
///
/// Returns `None` if the sink requested cancellation.
#[must_use]
pub fn find_coincidences(
    centroids: &[ClusterCentroid],
    window: f64,
    sink: &dyn ProgressSink,
) -> Option<Coincidences> {
    sink.status("Finding coincidences");
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| centroids[a].time.total_cmp(&centroids[b].time));

    let mut result = Coincidences::default();
    let mut counter = ProgressCounter::new(order.len() as u64);
    let mut i = 0;
    while i < order.len() {
        if counter.update(i as u64, sink).is_some() && sink.is_cancelled() {
            return None;
        }
        let start = centroids[order[i]].time;
        let mut end = i + 1;
        while end < order.len() && centroids[order[end]].time - start <= window {
            end += 1;
        }
        match end - i {
            1 => {}
            2 => result.pairs.push(CoincidencePair {
                id1: order[i],
                id2: order[i + 1],
            }),
            _ => result.nfolds.push(CoincidenceNFold {
                ids: order[i..end].to_vec(),
            }),
        }
        i = end;
    }
    counter.update(order.len() as u64, sink);

    log::debug!(
        "{} pairs and {} n-folds among {} centroids",
        result.pairs.len(),
        result.nfolds.len(),
        centroids.len()
    );
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hompix_core::NullProgress;

    fn at(times: &[f64]) -> Vec<ClusterCentroid> {
        times
            .iter()
            .map(|&t| ClusterCentroid::new(0.0, 0.0, t))
            .collect()
    }

    #[test]
    fn test_pairs_nfolds_and_singles() {
        let c = at(&[0.0, 5.0, 100.0, 200.0, 203.0, 206.0, 400.0]);
        let r = find_coincidences(&c, 10.0, &NullProgress).unwrap();
        assert_eq!(r.pairs, vec![CoincidencePair { id1: 0, id2: 1 }]);
        assert_eq!(r.nfolds, vec![CoincidenceNFold { ids: vec![3, 4, 5] }]);
    }

    #[test]
    fn test_window_is_inclusive() {
        let c = at(&[0.0, 0.5]);
        let r = find_coincidences(&c, 0.5, &NullProgress).unwrap();
        assert_eq!(r.pairs.len(), 1);
    }

    #[test]
    fn test_unsorted_input_is_scanned_in_time_order() {
        let c = at(&[50.0, 0.0, 52.0, 1.0]);
        let r = find_coincidences(&c, 3.0, &NullProgress).unwrap();
        assert_eq!(
            r.pairs,
            vec![
                CoincidencePair { id1: 1, id2: 3 },
                CoincidencePair { id1: 0, id2: 2 }
            ]
        );
    }

    #[test]
    fn test_group_window_measured_from_start() {
        // 0 and 8 pair; 16 is 16 away from the start so it stays alone.
        let c = at(&[0.0, 8.0, 16.0]);
        let r = find_coincidences(&c, 10.0, &NullProgress).unwrap();
        assert_eq!(r.pairs.len(), 1);
        assert!(r.nfolds.is_empty());
        assert_eq!(r.num_members(), 2);
    }
}
