//! Stable arrival-time sort of decoded hits.

use hompix_core::HitTable;
use rayon::prelude::*;

/// Permutation that orders `toas` non-decreasingly, keeping equal
/// timestamps in their original order.
#[must_use]
pub fn time_order(toas: &[i64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..toas.len()).collect();
    order.par_sort_by_key(|&i| toas[i]);
    order
}

/// Sorts a hit table by arrival time.
///
/// Stable and parallel; the result is a permutation of the input.
#[must_use]
pub fn sort_by_toa(hits: &HitTable) -> HitTable {
    if hits.is_time_sorted() {
        return hits.clone();
    }
    let order = time_order(hits.toas());
    hits.gather(&order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hompix_core::RawHit;

    #[test]
    fn test_sort_is_stable() {
        let table: HitTable = [
            RawHit::new(0, 0, 5, 1),
            RawHit::new(1, 0, 3, 2),
            RawHit::new(2, 0, 5, 3),
            RawHit::new(3, 0, 3, 4),
        ]
        .into_iter()
        .collect();
        let sorted = sort_by_toa(&table);
        assert_eq!(sorted.toas(), &[3, 3, 5, 5]);
        assert_eq!(sorted.tots(), &[2, 4, 1, 3]);
    }

    #[test]
    fn test_sorted_output_is_a_permutation() {
        let toas: Vec<i64> = (0..5000).map(|i| (i * 7919) % 1009).collect();
        let table: HitTable = toas
            .iter()
            .enumerate()
            .map(|(i, &t)| RawHit::new((i % 256) as u8, 0, t, (i % 1024) as u16))
            .collect();
        let sorted = sort_by_toa(&table);
        assert!(sorted.is_time_sorted());
        assert_eq!(sorted.len(), table.len());

        let mut a: Vec<_> = table.iter().map(|h| (h.toa, h.tot, h.addr.x)).collect();
        let mut b: Vec<_> = sorted.iter().map(|h| (h.toa, h.tot, h.addr.x)).collect();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }
}
