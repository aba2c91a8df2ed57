//! Structure of Arrays (`SoA`) hit storage.
//!
//! `HitTable` keeps the decoded hits in three parallel vectors rather than
//! an array of structs. Clustering and the analytics only ever touch one or
//! two columns at a time, which keeps their inner loops cache friendly.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::hit::{PixelAddr, RawHit};

/// Decoded hits stored in parallel columns.
///
/// The three columns always have equal length. Every length query checks
/// this and panics on a mismatch, since a mismatch can only come from a bug
/// in the code that built the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HitTable {
    addr: Vec<PixelAddr>,
    toa: Vec<i64>,
    tot: Vec<u16>,
}

impl HitTable {
    /// Creates a new empty table with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            addr: Vec::with_capacity(capacity),
            toa: Vec::with_capacity(capacity),
            tot: Vec::with_capacity(capacity),
        }
    }

    /// Builds a table from existing columns.
    ///
    /// # Panics
    /// Panics if the columns differ in length.
    #[must_use]
    pub fn from_columns(addr: Vec<PixelAddr>, toa: Vec<i64>, tot: Vec<u16>) -> Self {
        let table = Self { addr, toa, tot };
        table.check_lengths();
        table
    }

    #[inline]
    fn check_lengths(&self) {
        assert!(
            self.addr.len() == self.toa.len() && self.addr.len() == self.tot.len(),
            "hit table columns out of sync: addr={}, toa={}, tot={}",
            self.addr.len(),
            self.toa.len(),
            self.tot.len()
        );
    }

    /// Returns the number of hits.
    ///
    /// # Panics
    /// Panics if the columns differ in length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.check_lengths();
        self.addr.len()
    }

    /// Returns true if the table holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a hit.
    #[inline]
    pub fn push(&mut self, hit: RawHit) {
        self.addr.push(hit.addr);
        self.toa.push(hit.toa);
        self.tot.push(hit.tot);
    }

    /// Returns the hit at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<RawHit> {
        Some(RawHit {
            addr: *self.addr.get(index)?,
            toa: *self.toa.get(index)?,
            tot: *self.tot.get(index)?,
        })
    }

    /// Iterates over the hits in table order.
    pub fn iter(&self) -> impl Iterator<Item = RawHit> + '_ {
        self.addr
            .iter()
            .zip(&self.toa)
            .zip(&self.tot)
            .map(|((&addr, &toa), &tot)| RawHit { addr, toa, tot })
    }

    /// Pixel address column.
    #[must_use]
    pub fn addrs(&self) -> &[PixelAddr] {
        &self.addr
    }

    /// Arrival time column (ticks).
    #[must_use]
    pub fn toas(&self) -> &[i64] {
        &self.toa
    }

    /// Time-over-threshold column.
    #[must_use]
    pub fn tots(&self) -> &[u16] {
        &self.tot
    }

    /// Releases spare capacity after decoding.
    pub fn shrink_to_fit(&mut self) {
        self.addr.shrink_to_fit();
        self.toa.shrink_to_fit();
        self.tot.shrink_to_fit();
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn memsize(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.addr.len() * std::mem::size_of::<PixelAddr>()
            + self.toa.len() * std::mem::size_of::<i64>()
            + self.tot.len() * std::mem::size_of::<u16>()
    }

    /// Returns a new table whose row `i` is row `order[i]` of this table.
    ///
    /// # Panics
    /// Panics if `order` has a different length than the table or holds an
    /// out-of-range index.
    #[must_use]
    pub fn gather(&self, order: &[usize]) -> Self {
        assert_eq!(order.len(), self.len(), "permutation length mismatch");
        Self {
            addr: order.iter().map(|&i| self.addr[i]).collect(),
            toa: order.iter().map(|&i| self.toa[i]).collect(),
            tot: order.iter().map(|&i| self.tot[i]).collect(),
        }
    }

    /// Returns true if arrival times are non-decreasing.
    #[must_use]
    pub fn is_time_sorted(&self) -> bool {
        self.toa.windows(2).all(|w| w[0] <= w[1])
    }
}

impl FromIterator<RawHit> for HitTable {
    fn from_iter<I: IntoIterator<Item = RawHit>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut table = Self::with_capacity(iter.size_hint().0);
        for hit in iter {
            table.push(hit);
        }
        table
    }
}
