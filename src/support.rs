use serde::{Deserialize, Serialize};

use crate::{CritcoolError, DegreeSpec, Exponents, gridex_incl, invalid_config};

/// The multi-indices of the basis functions used by an approximant.
///
/// Row `j` holds the per-variable degrees of basis function `j`; its coefficient sits
/// at index `j` of the coefficient vector. Ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportSet {
    dim: usize,
    indices: Vec<Exponents>,
}

impl SupportSet {
    /// Every multi-index with `|α| <= degree`.
    pub fn total_degree(dim: usize, degree: usize) -> Self {
        let bounds = vec![degree as u8; dim];
        let indices = gridex_incl(&bounds)
            .filter(|alpha| alpha.iter().map(|&a| a as usize).sum::<usize>() <= degree)
            .collect();
        Self { dim, indices }
    }

    /// Every multi-index with `α_i <= degrees[i]`.
    pub fn tensor(degrees: &[usize]) -> Self {
        let bounds: Vec<u8> = degrees.iter().map(|&d| d as u8).collect();
        Self {
            dim: degrees.len(),
            indices: gridex_incl(&bounds).collect(),
        }
    }

    /// The support set for a non-adaptive degree policy.
    pub fn from_spec(dim: usize, degree: &DegreeSpec) -> Result<Self, CritcoolError> {
        match degree {
            DegreeSpec::Fixed(d) => Ok(Self::total_degree(dim, *d)),
            DegreeSpec::PerDimension(ds) if ds.len() == dim => Ok(Self::tensor(ds)),
            DegreeSpec::PerDimension(ds) => Err(invalid_config(format!(
                "per-dimension degree has {} entries for dimension {dim}",
                ds.len()
            ))),
            DegreeSpec::Adaptive { .. } => Err(invalid_config(
                "adaptive degree has no fixed support set",
            )),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exponents> {
        self.indices.iter()
    }

    pub fn get(&self, j: usize) -> &Exponents {
        &self.indices[j]
    }

    /// Highest degree appearing in each variable.
    pub fn max_degrees(&self) -> Vec<usize> {
        let mut max = vec![0usize; self.dim];
        for alpha in &self.indices {
            for (d, &a) in alpha.iter().enumerate() {
                max[d] = max[d].max(a as usize);
            }
        }
        max
    }

    /// Highest total degree `|α|`.
    pub fn total(&self) -> usize {
        self.indices
            .iter()
            .map(|alpha| alpha.iter().map(|&a| a as usize).sum())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions as pa;

    use super::*;
    use crate::binomial_coefficient;

    #[test]
    fn total_degree_sizes() {
        for dim in 1..=4u8 {
            for degree in 0..=6u8 {
                let support = SupportSet::total_degree(dim as usize, degree as usize);
                pa::assert_eq!(
                    support.len() as u64,
                    binomial_coefficient(dim + degree, dim),
                    "dim={dim} degree={degree}"
                );
                pa::assert_eq!(support.total(), degree as usize);
            }
        }
    }

    #[test]
    fn tensor_support() {
        let support = SupportSet::tensor(&[2, 1]);
        pa::assert_eq!(support.len(), 6);
        pa::assert_eq!(support.max_degrees(), vec![2, 1]);
        pa::assert_eq!(support.total(), 3);
        pa::assert_eq!(support.get(0).to_vec(), vec![0, 0]);
        pa::assert_eq!(support.get(5).to_vec(), vec![2, 1]);
    }

    #[test]
    fn adaptive_has_no_fixed_support() {
        let spec = DegreeSpec::Adaptive {
            tolerance: 1e-3,
            start: 2,
            max_degree: 6,
        };
        assert!(SupportSet::from_spec(2, &spec).is_err());
    }
}
