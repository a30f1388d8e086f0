use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LedgerError, Tokens};

/// How much a finished rental costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeePolicy {
    /// One `rent_fee` per rental, whatever its length
    #[default]
    Flat,
    /// One `rent_fee` per started minute, at least one
    PerMinute,
}

impl FeePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeePolicy::Flat => "flat",
            FeePolicy::PerMinute => "per-minute",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "flat" => Some(FeePolicy::Flat),
            "per-minute" | "per_minute" | "perminute" => Some(FeePolicy::PerMinute),
            _ => None,
        }
    }

    /// Amount owed for a rental of `elapsed` at `rent_fee`.
    pub fn charge(&self, rent_fee: Tokens, elapsed: Duration) -> Result<Tokens, LedgerError> {
        match self {
            FeePolicy::Flat => Ok(rent_fee),
            FeePolicy::PerMinute => {
                let minutes = elapsed.as_secs().div_ceil(60).max(1);
                i64::try_from(minutes)
                    .ok()
                    .and_then(|m| rent_fee.checked_mul(m))
                    .ok_or_else(|| {
                        LedgerError::InvalidAmount(format!(
                            "rent of {} over {} minutes overflows",
                            rent_fee, minutes
                        ))
                    })
            }
        }
    }
}

impl std::fmt::Display for FeePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rules applied by the rental ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRules {
    /// Check-in is refused before this much time has passed since check-out
    pub min_rental: Duration,
    pub fee_policy: FeePolicy,
    /// Refuse check-out while the user still owes money
    pub require_settled_debt: bool,
}

impl Default for RentalRules {
    fn default() -> Self {
        Self {
            min_rental: Duration::from_secs(5),
            fee_policy: FeePolicy::Flat,
            require_settled_debt: true,
        }
    }
}

impl RentalRules {
    pub fn with_min_rental(mut self, min_rental: Duration) -> Self {
        self.min_rental = min_rental;
        self
    }

    pub fn with_fee_policy(mut self, fee_policy: FeePolicy) -> Self {
        self.fee_policy = fee_policy;
        self
    }

    pub fn with_require_settled_debt(mut self, require: bool) -> Self {
        self.require_settled_debt = require;
        self
    }

    pub fn ensure_min_hold(&self, elapsed: Duration) -> Result<(), LedgerError> {
        if elapsed < self.min_rental {
            return Err(LedgerError::RentalTooShort {
                elapsed,
                minimum: self.min_rental,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_fee_ignores_duration() {
        let policy = FeePolicy::Flat;
        assert_eq!(policy.charge(10, Duration::from_secs(6)), Ok(10));
        assert_eq!(policy.charge(10, Duration::from_secs(6 * 3600)), Ok(10));
    }

    #[test]
    fn test_per_minute_fee_counts_started_minutes() {
        let policy = FeePolicy::PerMinute;
        assert_eq!(policy.charge(20, Duration::from_secs(0)), Ok(20));
        assert_eq!(policy.charge(20, Duration::from_secs(60)), Ok(20));
        assert_eq!(policy.charge(20, Duration::from_secs(61)), Ok(40));
        assert_eq!(policy.charge(20, Duration::from_secs(600)), Ok(200));
    }

    #[test]
    fn test_per_minute_fee_overflow() {
        assert!(matches!(
            FeePolicy::PerMinute.charge(Tokens::MAX, Duration::from_secs(120)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_min_hold_gate() {
        let rules = RentalRules::default().with_min_rental(Duration::from_secs(5));
        assert!(rules.ensure_min_hold(Duration::from_secs(5)).is_ok());
        assert!(matches!(
            rules.ensure_min_hold(Duration::from_secs(4)),
            Err(LedgerError::RentalTooShort { .. })
        ));
    }

    #[test]
    fn test_fee_policy_names() {
        assert_eq!(FeePolicy::from_name("flat"), Some(FeePolicy::Flat));
        assert_eq!(FeePolicy::from_name("Per-Minute"), Some(FeePolicy::PerMinute));
        assert_eq!(FeePolicy::from_name("hourly"), None);
    }
}
