use serde::Serialize;

use super::{
    AccountBalance, CarRegistry, CarStatus, Clock, RentalLedger, RentalRules, Tokens,
    UserRegistry,
};

/// Everything the platform knows: users, cars and the collected-payments pool.
/// Cheap enough to clone, which is how operations stay all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub users: UserRegistry,
    pub cars: CarRegistry,
    pub total_payments: Tokens,
}

impl LedgerState {
    pub fn new(users: UserRegistry, cars: CarRegistry, total_payments: Tokens) -> Self {
        Self {
            users,
            cars,
            total_payments,
        }
    }

    pub fn accounts(&mut self) -> AccountBalance<'_> {
        AccountBalance::new(&mut self.users, &mut self.total_payments)
    }

    pub fn rentals<'a>(
        &'a mut self,
        rules: &'a RentalRules,
        clock: &'a dyn Clock,
    ) -> RentalLedger<'a> {
        RentalLedger::new(
            &mut self.users,
            &mut self.cars,
            &mut self.total_payments,
            rules,
            clock,
        )
    }

    /// Cross-check users against cars.
    pub fn check_integrity(&self) -> IntegrityReport {
        let mut issues = Vec::new();

        for user in self.users.iter() {
            if user.balance < 0 {
                issues.push(format!("user {} has negative balance {}", user.id, user.balance));
            }
            if user.debt < 0 {
                issues.push(format!("user {} has negative debt {}", user.id, user.debt));
            }
            let Some(car_id) = user.rented_car() else {
                continue;
            };
            match self.cars.get_car(car_id) {
                Err(_) => issues.push(format!("user {} rents unknown car {}", user.id, car_id)),
                Ok(car) if car.renter_id.as_deref() != Some(user.id.as_str()) => {
                    issues.push(format!(
                        "user {} rents car {} but the car's renter is {:?}",
                        user.id, car_id, car.renter_id
                    ))
                }
                Ok(car) if car.status != CarStatus::Rented => issues.push(format!(
                    "car {} is rented by {} but marked {}",
                    car_id, user.id, car.status
                )),
                Ok(_) => {}
            }
        }

        for car in self.cars.iter() {
            match &car.renter_id {
                Some(renter) => {
                    let holds = self
                        .users
                        .get_user(renter)
                        .is_ok_and(|u| u.rented_car_id == car.id);
                    if !holds {
                        issues.push(format!(
                            "car {} names renter {} who does not hold it",
                            car.id, renter
                        ));
                    }
                }
                None if car.status == CarStatus::Rented => {
                    issues.push(format!("car {} is marked rented without a renter", car.id))
                }
                None => {}
            }
        }

        if self.total_payments < 0 {
            issues.push(format!("total payments is negative: {}", self.total_payments));
        }

        IntegrityReport {
            user_count: self.users.len(),
            car_count: self.cars.car_count(),
            active_rentals: self.users.iter().filter(|u| u.is_renting()).count(),
            total_payments: self.total_payments,
            issues,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub user_count: usize,
    pub car_count: usize,
    pub active_rentals: usize,
    pub total_payments: Tokens,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::{CarMetadata, ManualClock};

    fn state_with_rental(clock: &ManualClock, rules: &RentalRules) -> LedgerState {
        let mut state = LedgerState::default();
        state
            .users
            .add_user("alice", "Alice".into(), "Smith".into())
            .unwrap();
        state
            .cars
            .add_car(CarMetadata::new("Tesla Model S", "url", 10, 5000))
            .unwrap();
        state.rentals(rules, clock).check_out(1, "alice").unwrap();
        state
    }

    #[test]
    fn test_clean_state_after_rental_cycle() {
        let clock = ManualClock::new(Utc::now());
        let rules = RentalRules::default();
        let mut state = state_with_rental(&clock, &rules);

        let report = state.check_integrity();
        assert!(report.is_ok(), "{:?}", report.issues);
        assert_eq!(report.active_rentals, 1);

        clock.advance(Duration::from_secs(10));
        state.rentals(&rules, &clock).check_in("alice").unwrap();
        state.accounts().deposit("alice", 100).unwrap();
        state.rentals(&rules, &clock).make_payment("alice").unwrap();

        let report = state.check_integrity();
        assert!(report.is_ok(), "{:?}", report.issues);
        assert_eq!(report.active_rentals, 0);
        assert_eq!(report.total_payments, 10);
    }

    #[test]
    fn test_status_edit_during_rental_is_reported() {
        let clock = ManualClock::new(Utc::now());
        let rules = RentalRules::default();
        let mut state = state_with_rental(&clock, &rules);

        state
            .cars
            .edit_car_status(1, CarStatus::Unavailable)
            .unwrap();

        let report = state.check_integrity();
        assert!(!report.is_ok());
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_clone_isolates_working_copy() {
        let clock = ManualClock::new(Utc::now());
        let rules = RentalRules::default();
        let state = state_with_rental(&clock, &rules);

        let mut working = state.clone();
        working.accounts().deposit("alice", 50).unwrap();

        assert_eq!(state.users.get_user("alice").unwrap().balance, 0);
        assert_eq!(working.users.get_user("alice").unwrap().balance, 50);
    }
}
