use crate::core::position::HedgePosition;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a position stands relative to a valuation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Closed or matured on or before the valuation date.
    Realized,
    /// Started and still open on the valuation date.
    Latent,
    /// Not yet started; never priced.
    Future,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Realized => write!(f, "REALIZED"),
            LifecycleState::Latent => write!(f, "LATENT"),
            LifecycleState::Future => write!(f, "FUTURE"),
        }
    }
}

/// Classify a position as of `as_of` purely from its dates.
pub fn classify(position: &HedgePosition, as_of: NaiveDate) -> LifecycleState {
    if position.closing_date() <= as_of {
        LifecycleState::Realized
    } else if position.start_date() <= as_of {
        LifecycleState::Latent
    } else {
        LifecycleState::Future
    }
}

/// Positions split by lifecycle state, each list in input order.
#[derive(Debug, Clone, Default)]
pub struct Partition<'a> {
    pub realized: Vec<&'a HedgePosition>,
    pub latent: Vec<&'a HedgePosition>,
    pub future: Vec<&'a HedgePosition>,
}

impl<'a> Partition<'a> {
    pub fn len(&self) -> usize {
        self.realized.len() + self.latent.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `positions` as of `as_of`. Every position lands in exactly
/// one list.
pub fn partition(positions: &[HedgePosition], as_of: NaiveDate) -> Partition<'_> {
    let mut result = Partition::default();
    for position in positions {
        match classify(position, as_of) {
            LifecycleState::Realized => result.realized.push(position),
            LifecycleState::Latent => result.latent.push(position),
            LifecycleState::Future => result.future.push(position),
        }
    }
    result
}
