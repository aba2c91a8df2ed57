//! Coincidence groups and the spectral events derived from them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two centroids inside one coincidence window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidencePair {
    /// Earlier centroid index.
    pub id1: usize,
    /// Later centroid index.
    pub id2: usize,
}

/// Three or more centroids inside one coincidence window.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidenceNFold {
    /// Centroid indices in time order.
    pub ids: Vec<usize>,
}

/// Borrowed view over one coincidence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoincidenceGroup<'a> {
    /// Exactly two centroids.
    Pair(&'a CoincidencePair),
    /// Three or more centroids.
    NFold(&'a CoincidenceNFold),
}

impl CoincidenceGroup<'_> {
    /// Centroid indices in the group.
    #[must_use]
    pub fn ids(&self) -> Vec<usize> {
        match self {
            Self::Pair(p) => vec![p.id1, p.id2],
            Self::NFold(n) => n.ids.clone(),
        }
    }
}

/// Output of the coincidence detector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coincidences {
    /// Two-fold coincidences.
    pub pairs: Vec<CoincidencePair>,
    /// Higher-order coincidences.
    pub nfolds: Vec<CoincidenceNFold>,
}

impl Coincidences {
    /// Returns true if no group was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.nfolds.is_empty()
    }

    /// Iterates pairs first, then n-folds.
    pub fn groups(&self) -> impl Iterator<Item = CoincidenceGroup<'_>> {
        self.pairs
            .iter()
            .map(CoincidenceGroup::Pair)
            .chain(self.nfolds.iter().map(CoincidenceGroup::NFold))
    }

    /// Number of centroids that belong to some group.
    #[must_use]
    pub fn num_members(&self) -> usize {
        self.pairs.len() * 2 + self.nfolds.iter().map(|n| n.ids.len()).sum::<usize>()
    }
}

/// Channel assignment of one coincidence pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpectralEvent {
    /// Along-line coordinate of the first centroid, in pixels.
    pub pixel1: f64,
    /// Along-line coordinate of the second centroid, in pixels.
    pub pixel2: f64,
    /// Channel (1 or 2) of the first centroid.
    pub channel1: u8,
    /// Channel (1 or 2) of the second centroid.
    pub channel2: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_and_members() {
        let c = Coincidences {
            pairs: vec![CoincidencePair { id1: 0, id2: 1 }],
            nfolds: vec![CoincidenceNFold { ids: vec![4, 5, 6] }],
        };
        let groups: Vec<_> = c.groups().map(|g| g.ids()).collect();
        assert_eq!(groups, vec![vec![0, 1], vec![4, 5, 6]]);
        assert_eq!(c.num_members(), 5);
        assert!(!c.is_empty());
        assert!(Coincidences::default().is_empty());
    }
}
