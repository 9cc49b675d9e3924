use num_traits::{Num, NumAssignOps};
use smallvec::SmallVec;

/// A multi-index, one entry per variable.
pub type Gridex<T> = SmallVec<[T; 4]>;

/// Iterates over all multi-indices `[i_1, ..., i_n]` in lexicographic order (the last
/// variable varies fastest), where `n = grid_size.len()` and
/// - with [`Boundary::Inclusive`]: `0 <= i_k <= grid_size[k]`,
/// - with [`Boundary::Exclusive`]: `0 <= i_k < grid_size[k]`.
///
/// An exclusive size of zero in any variable yields nothing. Zero variables yield the
/// single empty index.
pub fn gridex<T: Num + NumAssignOps + Copy + PartialOrd>(
    grid_size: &[T],
    boundary: Boundary,
) -> impl Iterator<Item = Gridex<T>> + use<T> {
    let limits: Gridex<T> = match boundary {
        Boundary::Inclusive => grid_size.iter().copied().collect(),
        Boundary::Exclusive => grid_size
            .iter()
            .map(|&s| if s > T::zero() { s - T::one() } else { s })
            .collect(),
    };
    let mut done = match boundary {
        Boundary::Inclusive => false,
        Boundary::Exclusive => grid_size.iter().any(|&s| s <= T::zero()),
    };
    let mut indices: Gridex<T> = smallvec::smallvec![T::zero(); limits.len()];

    std::iter::from_fn(move || {
        if done {
            return None;
        }

        let current = indices.clone();

        if limits.is_empty() {
            done = true;
        }
        for i in (0..limits.len()).rev() {
            if indices[i] < limits[i] {
                indices[i] += T::one();
                break;
            } else {
                indices[i] = T::zero();
                if i == 0 {
                    done = true;
                }
            }
        }

        Some(current)
    })
}

pub fn gridex_incl<T: Num + NumAssignOps + Copy + PartialOrd>(
    grid_size: &[T],
) -> impl Iterator<Item = Gridex<T>> + use<T> {
    gridex(grid_size, Boundary::Inclusive)
}

pub fn gridex_excl<T: Num + NumAssignOps + Copy + PartialOrd>(
    grid_size: &[T],
) -> impl Iterator<Item = Gridex<T>> + use<T> {
    gridex(grid_size, Boundary::Exclusive)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Inclusive,
    Exclusive,
}
