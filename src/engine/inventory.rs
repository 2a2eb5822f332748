#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::PositionState;

/// Tracks the open position of a simulation run.
///
/// `units` counts executed entries (one per taker trade or maker fill) and is
/// what the inventory cap applies to; `position` is the signed base amount held.
/// Both always share the same sign.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    // Signed count of open units
    units: i32,
    // Signed base amount held
    position: f64,
    // Largest |units| seen so far
    max_seen: u32,
    // Cap on |units|, unbounded when `None`
    limit: Option<u32>,
}

impl Inventory {
    /// Creates a flat inventory with an optional cap.
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    /// Returns the signed count of open units.
    pub fn units(&self) -> i32 {
        self.units
    }

    /// Returns the signed base amount held.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Returns the largest absolute inventory seen so far.
    pub fn max_seen(&self) -> u32 {
        self.max_seen
    }

    /// Returns the inventory cap.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn is_flat(&self) -> bool {
        self.units == 0
    }

    pub fn is_long(&self) -> bool {
        self.units > 0
    }

    pub fn is_short(&self) -> bool {
        self.units < 0
    }

    /// Returns true if no further same-direction unit may be added.
    pub fn is_capped(&self) -> bool {
        self.limit.is_some_and(|limit| self.units.unsigned_abs() >= limit)
    }

    /// Adds one unit of `amount` on the buy side (`buy = true`) or the sell side.
    ///
    /// Must only be called when flat or already positioned on the same side.
    pub(crate) fn add(&mut self, buy: bool, amount: f64) -> PositionState {
        let state = if self.is_flat() {
            PositionState::Open
        } else {
            PositionState::Increase
        };

        if buy {
            self.units += 1;
            self.position += amount;
        } else {
            self.units -= 1;
            self.position -= amount;
        }

        state
    }

    /// Flattens the position and returns the base amount that was held.
    pub(crate) fn close(&mut self) -> f64 {
        let amount = self.position.abs();
        self.units = 0;
        self.position = 0.0;
        amount
    }

    /// Updates the largest absolute inventory seen.
    pub(crate) fn track_max(&mut self) {
        self.max_seen = self.max_seen.max(self.units.unsigned_abs());
    }
}

#[cfg(test)]
#[test]
fn new_inventory_is_flat() {
    let inventory = Inventory::new(Some(2));
    assert!(inventory.is_flat());
    assert_eq!(inventory.units(), 0);
    assert_eq!(inventory.position(), 0.0);
    assert_eq!(inventory.limit(), Some(2));
    assert!(!inventory.is_capped());
}

#[cfg(test)]
#[test]
fn open_and_increase() {
    let mut inventory = Inventory::new(None);
    assert_eq!(inventory.add(true, 1.5), PositionState::Open);
    assert_eq!(inventory.add(true, 1.5), PositionState::Increase);
    assert!(inventory.is_long());
    assert_eq!(inventory.units(), 2);
    assert_eq!(inventory.position(), 3.0);
}

#[cfg(test)]
#[test]
fn open_short_and_close() {
    let mut inventory = Inventory::new(None);
    assert_eq!(inventory.add(false, 2.0), PositionState::Open);
    assert!(inventory.is_short());
    assert_eq!(inventory.position(), -2.0);

    let closed = inventory.close();
    assert_eq!(closed, 2.0);
    assert!(inventory.is_flat());
    assert_eq!(inventory.position(), 0.0);
}

#[cfg(test)]
#[test]
fn cap_reached() {
    let mut inventory = Inventory::new(Some(2));
    inventory.add(false, 1.0);
    assert!(!inventory.is_capped());
    inventory.add(false, 1.0);
    assert!(inventory.is_capped());

    // zero cap forbids any entry
    let inventory = Inventory::new(Some(0));
    assert!(inventory.is_capped());

    let inventory = Inventory::new(None);
    assert!(!inventory.is_capped());
}

#[cfg(test)]
#[test]
fn max_seen_never_decreases() {
    let mut inventory = Inventory::new(None);
    inventory.add(true, 1.0);
    inventory.add(true, 1.0);
    inventory.track_max();
    assert_eq!(inventory.max_seen(), 2);

    inventory.close();
    inventory.track_max();
    assert_eq!(inventory.max_seen(), 2);
}
