use std::sync::Arc;

use crate::domain::{AccountId, Clock, RentalRules, SystemClock};

/// Settings fixed for the lifetime of a [`super::RentalService`].
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// The account allowed to manage cars and withdraw collected payments
    pub owner: AccountId,
    pub rules: RentalRules,
    pub clock: Arc<dyn Clock>,
}

impl PlatformConfig {
    /// Default rules on the system clock.
    pub fn new(owner: impl Into<AccountId>) -> Self {
        Self {
            owner: owner.into(),
            rules: RentalRules::default(),
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_rules(mut self, rules: RentalRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_owner(&self, caller: &str) -> bool {
        self.owner == caller
    }
}
