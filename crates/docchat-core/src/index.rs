//! Nearest-neighbour index abstraction and the exact flat L2 index.
//!
//! The [`VectorIndex`] trait is the seam between retrieval and whatever
//! structure holds the vectors. [`FlatL2Index`] is the built-in
//! implementation: brute-force squared Euclidean distance over a
//! contiguous row-major buffer. For a single document of a few hundred
//! chunks a linear scan is exact and fast enough.

use std::cmp::Ordering;

use crate::embedding::l2_squared;
use crate::error::RagError;

/// One search hit: the position of a stored vector and its distance to
/// the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion position of the vector (matches the chunk position).
    pub id: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// A collection of fixed-dimension vectors supporting k-nearest lookup.
///
/// Ids are assigned in insertion order starting at 0.
pub trait VectorIndex: Send + Sync {
    /// Vector dimensionality accepted by this index.
    fn dims(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Returns `true` if no vectors are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector, returning its id.
    fn add(&mut self, vector: &[f32]) -> Result<usize, RagError>;

    /// Return up to `k` stored vectors ordered by ascending distance to `query`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RagError>;
}

/// Exact nearest-neighbour index over squared L2 distance.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dims: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    fn check_dims(&self, vector: &[f32], what: &str) -> Result<(), RagError> {
        if vector.len() != self.dims {
            return Err(RagError::Index(format!(
                "{} has dimension {}, index expects {}",
                what,
                vector.len(),
                self.dims
            )));
        }
        Ok(())
    }

    fn row(&self, id: usize) -> &[f32] {
        &self.data[id * self.dims..(id + 1) * self.dims]
    }
}

impl VectorIndex for FlatL2Index {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, RagError> {
        if self.dims == 0 {
            return Err(RagError::Index(
                "cannot add vectors to a zero-dimension index".to_string(),
            ));
        }
        self.check_dims(vector, "vector")?;
        let id = self.len();
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RagError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dims(query, "query")?;

        let mut hits: Vec<Neighbor> = (0..self.len())
            .map(|id| Neighbor {
                id,
                distance: l2_squared(query, self.row(id)),
            })
            .collect();

        // Stable sort keeps insertion order for equal distances.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(k.min(self.len()));
        Ok(hits)
    }
}
