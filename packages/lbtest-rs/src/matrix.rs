//! Cartesian expansion of a descriptor's parameter matrix into subtests.

use crate::descriptor::{ParameterSpec, RANK_COUNT_PARAMETER};
use crate::error::{HarnessError, Result};
use serde::Serialize;

/// One concrete assignment of a value to every parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ParameterCombination {
    pairs: Vec<(String, String)>,
}

impl ParameterCombination {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// The full set of combinations for a parameter list.
///
/// Iteration is lazy and can be restarted any number of times; the first
/// parameter varies slowest.
#[derive(Debug, Clone, Copy)]
pub struct ParameterMatrix<'a> {
    specs: &'a [ParameterSpec],
}

/// Expand a parameter list. An empty list yields a single empty combination.
pub fn expand(specs: &[ParameterSpec]) -> ParameterMatrix<'_> {
    ParameterMatrix { specs }
}

impl<'a> ParameterMatrix<'a> {
    /// Exact number of combinations.
    pub fn count(&self) -> usize {
        self.specs.iter().map(|p| p.values.len()).product()
    }

    pub fn iter(&self) -> Combinations<'a> {
        Combinations {
            specs: self.specs,
            indices: vec![0; self.specs.len()],
            remaining: self.count(),
        }
    }
}

impl<'a> IntoIterator for ParameterMatrix<'a> {
    type Item = ParameterCombination;
    type IntoIter = Combinations<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Odometer over the value indices of each parameter.
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    specs: &'a [ParameterSpec],
    indices: Vec<usize>,
    remaining: usize,
}

impl Iterator for Combinations<'_> {
    type Item = ParameterCombination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let pairs = self
            .specs
            .iter()
            .zip(&self.indices)
            .map(|(spec, &i)| (spec.key.clone(), spec.values[i].clone()))
            .collect();

        self.remaining -= 1;
        for (spec, index) in self.specs.iter().zip(self.indices.iter_mut()).rev() {
            *index += 1;
            if *index < spec.values.len() {
                break;
            }
            *index = 0;
        }

        Some(ParameterCombination::new(pairs))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}

/// Effective rank count of a subtest.
///
/// If the combination sets the rank-count parameter, its bracketed integer list
/// (e.g. `[2,3]`) is multiplied out; otherwise `base` is returned unchanged.
pub fn derive_rank_count(combination: &ParameterCombination, base: u32) -> Result<u32> {
    match combination.get(RANK_COUNT_PARAMETER) {
        Some(value) => parse_rank_product(value),
        None => Ok(base),
    }
}

fn parse_rank_product(value: &str) -> Result<u32> {
    let malformed = || HarnessError::MalformedRankCount(value.to_string());

    let inner = value
        .trim()
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(malformed)?;

    let mut product: u32 = 1;
    for entry in inner.split(',') {
        let n: u32 = entry.trim().parse().map_err(|_| malformed())?;
        product = product.checked_mul(n).ok_or_else(malformed)?;
    }
    if product == 0 {
        return Err(malformed());
    }
    Ok(product)
}
