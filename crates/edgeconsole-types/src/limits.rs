// Copyright (c) 2025 The EdgeConsole Authors
//
// This file is part of EdgeConsole.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact the EdgeConsole maintainers.

use crate::catalog::TierConfig;
use crate::error::ValidationError;
use crate::factory::INVERTER_ALIAS_PREFIX;
use std::collections::BTreeSet;
use thiserror::Error;

/// Why an inverter change was refused by the active tier
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierViolation {
    #[error("maximum of {max} inverters reached")]
    MaxInverters { max: usize },

    #[error("requested {requested_kw:.2} kW exceeds remaining capacity of {remaining_kw:.2} kW")]
    PowerExceeded { requested_kw: f64, remaining_kw: f64 },
}

/// Current inverter usage measured against one tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierUsage {
    pub tier: TierConfig,
    pub count: usize,
    pub total_kw: f64,
}

impl TierUsage {
    pub fn from_powers_w<I>(tier: TierConfig, powers_w: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let (count, total_w) = powers_w
            .into_iter()
            .fold((0, 0.0), |(count, total), power| (count + 1, total + power));
        Self {
            tier,
            count,
            total_kw: total_w / 1000.0,
        }
    }

    pub fn remaining_kw(&self) -> f64 {
        self.tier.max_total_power_kw - self.total_kw
    }

    /// No further inverter can be added
    pub fn is_at_limit(&self) -> bool {
        self.count >= self.tier.max_inverters || self.total_kw >= self.tier.max_total_power_kw
    }

    pub fn check_add(&self, power_w: f64) -> Result<(), TierViolation> {
        if self.count >= self.tier.max_inverters {
            return Err(TierViolation::MaxInverters {
                max: self.tier.max_inverters,
            });
        }
        let requested_kw = power_w / 1000.0;
        if requested_kw > self.remaining_kw() {
            return Err(TierViolation::PowerExceeded {
                requested_kw,
                remaining_kw: self.remaining_kw(),
            });
        }
        Ok(())
    }

    /// Only the increase over the inverter's current rating counts
    pub fn check_update(&self, old_power_w: f64, new_power_w: f64) -> Result<(), TierViolation> {
        let requested_kw = (new_power_w - old_power_w) / 1000.0;
        if requested_kw > self.remaining_kw() {
            return Err(TierViolation::PowerExceeded {
                requested_kw,
                remaining_kw: self.remaining_kw(),
            });
        }
        Ok(())
    }
}

/// Alias given to the next PV inverter
pub fn next_inverter_alias(count: usize) -> String {
    format!("{INVERTER_ALIAS_PREFIX}{count}")
}

/// Lowest `{prefix}{n}` not already taken
pub fn next_component_id<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: BTreeSet<u64> = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();

    let mut next = 0;
    while taken.contains(&next) {
        next += 1;
    }
    format!("{prefix}{next}")
}

pub fn percent_from_watt(watt: f64, total_w: f64) -> f64 {
    if total_w <= 0.0 {
        0.0
    } else {
        watt / total_w * 100.0
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn watt_from_percent(percent: f64, total_w: f64) -> u64 {
    (percent / 100.0 * total_w).round().max(0.0) as u64
}

/// Active power limit as entered by the operator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerLimitSetpoint {
    Watt(u64),
    Percent(f64),
}

impl PowerLimitSetpoint {
    /// Absolute limit in watts, refused above the installed inverter power
    #[expect(clippy::cast_precision_loss)]
    pub fn resolve(self, total_inverter_power_w: f64) -> Result<u64, ValidationError> {
        let watt = match self {
            Self::Watt(watt) => watt,
            Self::Percent(percent) => {
                if !(0.0..=100.0).contains(&percent) {
                    return Err(ValidationError::new(
                        "powerLimit",
                        "percentage must be between 0 and 100",
                    ));
                }
                watt_from_percent(percent, total_inverter_power_w)
            }
        };

        if watt as f64 > total_inverter_power_w {
            return Err(ValidationError::new(
                "powerLimit",
                "Power limit cannot exceed total inverter power.",
            ));
        }
        Ok(watt)
    }
}
