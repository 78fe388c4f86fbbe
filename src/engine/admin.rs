//! Owner-controlled parameters read by the registry.

use crate::domain::{Address, Amount, Event};
use crate::engine::constants::{DEFAULT_MULTIPLIER, MAX_CAPACITY};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("{caller} is not the owner")]
    NotOwner { caller: Address },
    #[error("{0} must not be the zero address")]
    ZeroAddress(&'static str),
    #[error("capacity must be at least 1")]
    ZeroCapacity,
    #[error("capacity must increase: current {current}, requested {requested}")]
    CapacityNotIncreasing { current: u32, requested: u32 },
    #[error("capacity {requested} exceeds maximum {max}")]
    CapacityTooLarge { requested: u32, max: u32 },
    #[error("multiplier table must not be empty")]
    EmptyMultipliers,
    #[error("multiplier {value} at position {position} is below 1x")]
    MultiplierBelowDefault { position: usize, value: Amount },
}

/// Global configuration. Mutated only through the owner-gated setters,
/// each of which enforces its own invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    owner: Address,
    capacity: u32,
    treasury: Address,
    team: Option<Address>,
    factions: BTreeSet<Address>,
    multipliers: Vec<Amount>,
}

impl AdminConfig {
    /// Initial configuration. `capacity` must be in `1..=MAX_CAPACITY`.
    pub fn new(
        owner: Address,
        treasury: Address,
        team: Option<Address>,
        capacity: u32,
        multipliers: Vec<Amount>,
    ) -> Result<Self, AdminError> {
        if owner.is_zero() {
            return Err(AdminError::ZeroAddress("owner"));
        }
        if treasury.is_zero() {
            return Err(AdminError::ZeroAddress("treasury"));
        }
        if capacity == 0 {
            return Err(AdminError::ZeroCapacity);
        }
        if capacity > MAX_CAPACITY {
            return Err(AdminError::CapacityTooLarge {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        validate_multipliers(&multipliers)?;

        Ok(Self {
            owner,
            capacity,
            treasury,
            team: team.and_then(Address::non_zero),
            factions: BTreeSet::new(),
            multipliers,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn treasury(&self) -> Address {
        self.treasury
    }

    pub fn team(&self) -> Option<Address> {
        self.team
    }

    pub fn is_faction(&self, addr: &Address) -> bool {
        self.factions.contains(addr)
    }

    pub fn factions(&self) -> impl Iterator<Item = &Address> {
        self.factions.iter()
    }

    pub fn multipliers(&self) -> &[Amount] {
        &self.multipliers
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), AdminError> {
        if caller != self.owner {
            return Err(AdminError::NotOwner { caller });
        }
        Ok(())
    }

    /// Raise capacity. Never decreases.
    pub fn set_capacity(&mut self, caller: Address, capacity: u32) -> Result<Event, AdminError> {
        self.ensure_owner(caller)?;
        if capacity <= self.capacity {
            return Err(AdminError::CapacityNotIncreasing {
                current: self.capacity,
                requested: capacity,
            });
        }
        if capacity > MAX_CAPACITY {
            return Err(AdminError::CapacityTooLarge {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        self.capacity = capacity;
        Ok(Event::CapacitySet { capacity })
    }

    /// Replace the multiplier table wholesale.
    pub fn set_multipliers(
        &mut self,
        caller: Address,
        multipliers: Vec<Amount>,
    ) -> Result<Event, AdminError> {
        self.ensure_owner(caller)?;
        validate_multipliers(&multipliers)?;
        self.multipliers = multipliers.clone();
        Ok(Event::MultipliersSet { multipliers })
    }

    pub fn set_treasury(&mut self, caller: Address, treasury: Address) -> Result<Event, AdminError> {
        self.ensure_owner(caller)?;
        if treasury.is_zero() {
            return Err(AdminError::ZeroAddress("treasury"));
        }
        self.treasury = treasury;
        Ok(Event::TreasurySet { treasury })
    }

    /// Zero address disables the team share.
    pub fn set_team(&mut self, caller: Address, team: Address) -> Result<Event, AdminError> {
        self.ensure_owner(caller)?;
        self.team = team.non_zero();
        Ok(Event::TeamSet { team: self.team })
    }

    /// Add or remove a faction from the whitelist. Idempotent.
    pub fn set_faction(
        &mut self,
        caller: Address,
        faction: Address,
        whitelisted: bool,
    ) -> Result<Event, AdminError> {
        self.ensure_owner(caller)?;
        if faction.is_zero() {
            return Err(AdminError::ZeroAddress("faction"));
        }
        if whitelisted {
            self.factions.insert(faction);
        } else {
            self.factions.remove(&faction);
        }
        Ok(Event::FactionSet {
            faction,
            whitelisted,
        })
    }
}

fn validate_multipliers(multipliers: &[Amount]) -> Result<(), AdminError> {
    if multipliers.is_empty() {
        return Err(AdminError::EmptyMultipliers);
    }
    if let Some((position, value)) = multipliers
        .iter()
        .enumerate()
        .find(|(_, m)| **m < DEFAULT_MULTIPLIER)
    {
        return Err(AdminError::MultiplierBelowDefault {
            position,
            value: *value,
        });
    }
    Ok(())
}
