use common_money::Money;
use thiserror::Error;
use uuid::Uuid;

use crate::models::PointsSlab;

#[derive(Debug, Error, PartialEq)]
pub enum SlabError {
    #[error("slab {id} has lower bound {lower} above upper bound {upper}")]
    Inverted { id: Uuid, lower: Money, upper: Money },
    #[error("slab {id} awards negative points")]
    NegativePoints { id: Uuid },
    #[error("slabs {first} and {second} overlap")]
    Overlap { first: Uuid, second: Uuid },
}

/// Validated award table. A slab covers `(lower, upper]`, so contiguous slabs
/// like `0-500` and `500-1000` share a boundary without overlapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlabTable {
    slabs: Vec<PointsSlab>,
}

fn check_shape(slab: &PointsSlab) -> Result<(), SlabError> {
    if slab.lower > slab.upper {
        return Err(SlabError::Inverted {
            id: slab.id,
            lower: slab.lower,
            upper: slab.upper,
        });
    }
    if slab.loyalty_points < 0 {
        return Err(SlabError::NegativePoints { id: slab.id });
    }
    Ok(())
}

impl SlabTable {
    pub fn new(mut slabs: Vec<PointsSlab>) -> Result<Self, SlabError> {
        for slab in &slabs {
            check_shape(slab)?;
        }
        slabs.sort_by_key(|s| (s.lower, s.upper));
        for pair in slabs.windows(2) {
            if pair[1].lower < pair[0].upper {
                return Err(SlabError::Overlap {
                    first: pair[0].id,
                    second: pair[1].id,
                });
            }
        }
        Ok(Self { slabs })
    }

    pub fn slabs(&self) -> &[PointsSlab] {
        &self.slabs
    }

    /// Reject a new slab that is malformed or would overlap the table.
    pub fn check_insert(&self, candidate: &PointsSlab) -> Result<(), SlabError> {
        check_shape(candidate)?;
        match self
            .slabs
            .iter()
            .find(|s| candidate.lower < s.upper && s.lower < candidate.upper)
        {
            Some(existing) => Err(SlabError::Overlap {
                first: existing.id,
                second: candidate.id,
            }),
            None => Ok(()),
        }
    }

    /// Points earned for an order of `amount`; zero outside every range.
    pub fn award(&self, amount: Money) -> i64 {
        let idx = self.slabs.partition_point(|s| s.lower < amount);
        match idx.checked_sub(1).map(|i| &self.slabs[i]) {
            Some(slab) if amount <= slab.upper => slab.loyalty_points,
            _ => 0,
        }
    }
}

/// Whole points redeemed for a rupee request: `floor(min(requested, balance))`, never negative.
pub fn redeem(requested: Money, balance: i64) -> i64 {
    requested.whole_units().min(balance).max(0)
}
