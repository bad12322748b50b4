//! Combination generator — 2- and 3-factor subsets of the selected factors.
//!
//! Subsets are produced in lexicographic index order, all smaller sizes
//! before larger ones, so truncating to the first N is deterministic.

use factorlab_core::domain::{FactorLeg, FactorResult};

use crate::config::ConfigError;

pub const MIN_COMBINATION_SIZE: usize = 2;
pub const MAX_COMBINATION_SIZE: usize = 3;

/// A candidate strategy: the member factor results, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Combination {
    pub members: Vec<FactorResult>,
}

impl Combination {
    pub fn legs(&self) -> Vec<FactorLeg> {
        self.members.iter().map(FactorResult::leg).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Mean of the members' own information coefficients.
    pub fn average_information_coefficient(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.information_coefficient).sum::<f64>() / self.members.len() as f64
    }
}

/// Lazy iterator over index subsets of `0..n` with sizes `min..=max`.
#[derive(Debug, Clone)]
pub struct IndexCombinations {
    n: usize,
    max: usize,
    current: Option<Vec<usize>>,
}

impl IndexCombinations {
    pub fn new(n: usize, min: usize, max: usize) -> Self {
        let mut iter = Self {
            n,
            max,
            current: None,
        };
        iter.current = iter.first_of_size(min);
        iter
    }

    fn first_of_size(&self, mut k: usize) -> Option<Vec<usize>> {
        while k <= self.max {
            if k > 0 && k <= self.n {
                return Some((0..k).collect());
            }
            k += 1;
        }
        None
    }

    fn advance(&self, current: &[usize]) -> Option<Vec<usize>> {
        let k = current.len();
        let mut next = current.to_vec();
        // rightmost position that can still move right
        for i in (0..k).rev() {
            if next[i] < self.n - k + i {
                next[i] += 1;
                for j in i + 1..k {
                    next[j] = next[j - 1] + 1;
                }
                return Some(next);
            }
        }
        self.first_of_size(k + 1)
    }
}

impl Iterator for IndexCombinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        self.current = self.advance(&current);
        Some(current)
    }
}

/// Number of subsets of sizes `min..=max` drawn from `n` items.
pub fn combination_count(n: usize, min: usize, max: usize) -> u128 {
    (min..=max).map(|k| binomial(n as u128, k as u128)).sum()
}

fn binomial(n: u128, k: u128) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1u128, |acc, i| acc * (n - i) / (i + 1))
}

pub fn generate_combinations(
    candidates: &[FactorResult],
    min_size: usize,
    max_size: usize,
    max_combinations: Option<usize>,
) -> Result<Vec<Combination>, ConfigError> {
    if !(MIN_COMBINATION_SIZE <= min_size && min_size <= max_size && max_size <= MAX_COMBINATION_SIZE) {
        return Err(ConfigError::InvalidCombinationSize {
            min: min_size,
            max: max_size,
        });
    }
    if max_combinations == Some(0) {
        return Err(ConfigError::ZeroMaxCombinations);
    }
    let limit = max_combinations.unwrap_or(usize::MAX);
    Ok(IndexCombinations::new(candidates.len(), min_size, max_size)
        .take(limit)
        .map(|idx| Combination {
            members: idx.into_iter().map(|i| candidates[i].clone()).collect(),
        })
        .collect())
}
