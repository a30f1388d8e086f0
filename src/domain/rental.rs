use std::time::Duration;

use super::{
    AccountBalance, CarId, CarRegistry, CarStatus, Clock, LedgerError, RentalRules, Tokens,
    UserRegistry, credit, elapsed_between,
};

/// Outcome of a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub car_id: CarId,
    pub elapsed: Duration,
    /// Rent added to the user's debt
    pub charged: Tokens,
}

/// The rental state machine over users and cars.
///
/// A car goes `Available -> Rented` on check-out and back on check-in.
/// Check-in accrues rent as debt; payment moves that debt from the user's
/// balance into the collected pool.
pub struct RentalLedger<'a> {
    users: &'a mut UserRegistry,
    cars: &'a mut CarRegistry,
    collected: &'a mut Tokens,
    rules: &'a RentalRules,
    clock: &'a dyn Clock,
}

impl<'a> RentalLedger<'a> {
    pub fn new(
        users: &'a mut UserRegistry,
        cars: &'a mut CarRegistry,
        collected: &'a mut Tokens,
        rules: &'a RentalRules,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            users,
            cars,
            collected,
            rules,
            clock,
        }
    }

    pub fn check_out(&mut self, car_id: CarId, user_id: &str) -> Result<(), LedgerError> {
        let user = self.users.get_user_mut(user_id)?;
        if let Some(rented) = user.rented_car() {
            return Err(LedgerError::AlreadyRented {
                user: user.id.clone(),
                car_id: rented,
            });
        }
        if self.rules.require_settled_debt && user.debt > 0 {
            return Err(LedgerError::OutstandingDebt {
                user: user.id.clone(),
                debt: user.debt,
            });
        }

        let car = self.cars.get_car_mut(car_id)?;
        if !car.is_available() || car.renter_id.is_some() {
            return Err(LedgerError::CarUnavailable(car_id));
        }

        car.status = CarStatus::Rented;
        car.renter_id = Some(user.id.clone());
        user.start_rental(car_id, self.clock.now());
        Ok(())
    }

    pub fn check_in(&mut self, user_id: &str) -> Result<CheckIn, LedgerError> {
        let user = self.users.get_user_mut(user_id)?;
        let car_id = user
            .rented_car()
            .ok_or_else(|| LedgerError::NotRented(user.id.clone()))?;
        let car = self.cars.get_car_mut(car_id)?;

        let now = self.clock.now();
        let elapsed = user
            .rental_started_at
            .map_or(Duration::ZERO, |start| elapsed_between(start, now));
        self.rules.ensure_min_hold(elapsed)?;

        let charged = self.rules.fee_policy.charge(car.rent_fee, elapsed)?;
        let debt = credit(user.debt, charged)?;

        // An owner-set Unavailable outlives the rental
        if car.status != CarStatus::Unavailable {
            car.status = CarStatus::Available;
        }
        car.renter_id = None;
        user.debt = debt;
        user.end_rental();

        Ok(CheckIn {
            car_id,
            elapsed,
            charged,
        })
    }

    /// Settle the user's whole debt from their balance. Returns the amount paid.
    pub fn make_payment(&mut self, user_id: &str) -> Result<Tokens, LedgerError> {
        let debt = self.users.get_user(user_id)?.debt;
        if debt == 0 {
            return Err(LedgerError::NothingOwed(user_id.to_string()));
        }

        AccountBalance::new(&mut *self.users, &mut *self.collected).collect(user_id, debt)?;
        self.users.get_user_mut(user_id)?.debt = 0;
        Ok(debt)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{CarMetadata, FeePolicy, ManualClock, NO_CAR};

    struct Fixture {
        users: UserRegistry,
        cars: CarRegistry,
        collected: Tokens,
        rules: RentalRules,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            let mut users = UserRegistry::new();
            users
                .add_user("alice", "Alice".into(), "Smith".into())
                .unwrap();
            users.add_user("bob", "Bob".into(), "Jones".into()).unwrap();
            let mut cars = CarRegistry::new();
            cars.add_car(CarMetadata::new("Tesla Model S", "example url", 10, 5000))
                .unwrap();
            Self {
                users,
                cars,
                collected: 0,
                rules: RentalRules::default().with_min_rental(Duration::from_secs(5)),
                clock: ManualClock::new(Utc::now()),
            }
        }

        fn ledger(&mut self) -> RentalLedger<'_> {
            RentalLedger::new(
                &mut self.users,
                &mut self.cars,
                &mut self.collected,
                &self.rules,
                &self.clock,
            )
        }
    }

    #[test]
    fn test_check_out_marks_car_and_user() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();

        let car = fx.cars.get_car(1).unwrap();
        assert_eq!(car.status, CarStatus::Rented);
        assert_eq!(car.renter_id.as_deref(), Some("alice"));
        let user = fx.users.get_user("alice").unwrap();
        assert_eq!(user.rented_car_id, 1);
        assert_eq!(user.rental_started_at, Some(fx.clock.now()));
    }

    #[test]
    fn test_check_out_rented_car_fails_without_change() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();

        let result = fx.ledger().check_out(1, "bob");
        assert_eq!(result.unwrap_err(), LedgerError::CarUnavailable(1));
        assert_eq!(fx.users.get_user("bob").unwrap().rented_car_id, NO_CAR);
        assert_eq!(
            fx.cars.get_car(1).unwrap().renter_id.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_car_with_renter_is_unavailable_whatever_its_status() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.cars.get_car_mut(1).unwrap().status = CarStatus::Available;

        assert_eq!(
            fx.ledger().check_out(1, "bob").unwrap_err(),
            LedgerError::CarUnavailable(1)
        );
        assert_eq!(fx.users.get_user("bob").unwrap().rented_car_id, NO_CAR);
        assert_eq!(
            fx.cars.get_car(1).unwrap().renter_id.as_deref(),
            Some("alice")
        );
    }

    #[test]
    fn test_check_in_keeps_unavailable_status() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.cars.get_car_mut(1).unwrap().status = CarStatus::Unavailable;
        fx.clock.advance(Duration::from_secs(6));

        assert_eq!(fx.ledger().check_in("alice").unwrap().charged, 10);
        let car = fx.cars.get_car(1).unwrap();
        assert_eq!(car.status, CarStatus::Unavailable);
        assert_eq!(car.renter_id, None);
    }

    #[test]
    fn test_one_car_per_user() {
        let mut fx = Fixture::new();
        fx.cars
            .add_car(CarMetadata::new("Honda", "url", 5, 100))
            .unwrap();
        fx.ledger().check_out(1, "alice").unwrap();

        let result = fx.ledger().check_out(2, "alice");
        assert_eq!(
            result.unwrap_err(),
            LedgerError::AlreadyRented {
                user: "alice".into(),
                car_id: 1
            }
        );
        assert!(fx.cars.get_car(2).unwrap().is_available());
    }

    #[test]
    fn test_check_in_adds_flat_fee() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(6));

        let receipt = fx.ledger().check_in("alice").unwrap();
        assert_eq!(receipt.charged, 10);
        assert_eq!(receipt.elapsed, Duration::from_secs(6));

        let user = fx.users.get_user("alice").unwrap();
        assert_eq!(user.rented_car_id, NO_CAR);
        assert_eq!(user.debt, 10);
        let car = fx.cars.get_car(1).unwrap();
        assert!(car.is_available());
        assert_eq!(car.renter_id, None);
    }

    #[test]
    fn test_check_in_before_minimum_hold_fails() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(2));

        let result = fx.ledger().check_in("alice");
        assert!(matches!(result, Err(LedgerError::RentalTooShort { .. })));
        assert_eq!(fx.users.get_user("alice").unwrap().rented_car_id, 1);
        assert_eq!(fx.users.get_user("alice").unwrap().debt, 0);
    }

    #[test]
    fn test_check_in_without_rental() {
        let mut fx = Fixture::new();
        assert_eq!(
            fx.ledger().check_in("alice").unwrap_err(),
            LedgerError::NotRented("alice".into())
        );
    }

    #[test]
    fn test_per_minute_policy() {
        let mut fx = Fixture::new();
        fx.rules = fx.rules.clone().with_fee_policy(FeePolicy::PerMinute);
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(150));

        assert_eq!(fx.ledger().check_in("alice").unwrap().charged, 30);
    }

    #[test]
    fn test_outstanding_debt_blocks_checkout() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(6));
        fx.ledger().check_in("alice").unwrap();

        assert_eq!(
            fx.ledger().check_out(1, "alice").unwrap_err(),
            LedgerError::OutstandingDebt {
                user: "alice".into(),
                debt: 10
            }
        );

        fx.rules = fx.rules.clone().with_require_settled_debt(false);
        assert!(fx.ledger().check_out(1, "alice").is_ok());
    }

    #[test]
    fn test_make_payment_settles_debt() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(6));
        fx.ledger().check_in("alice").unwrap();
        fx.users.get_user_mut("alice").unwrap().balance = 100;

        assert_eq!(fx.ledger().make_payment("alice").unwrap(), 10);
        let user = fx.users.get_user("alice").unwrap();
        assert_eq!(user.debt, 0);
        assert_eq!(user.balance, 90);
        assert_eq!(fx.collected, 10);

        // Paying again with nothing owed changes nothing
        assert_eq!(
            fx.ledger().make_payment("alice").unwrap_err(),
            LedgerError::NothingOwed("alice".into())
        );
        assert_eq!(fx.users.get_user("alice").unwrap().balance, 90);
        assert_eq!(fx.collected, 10);
    }

    #[test]
    fn test_make_payment_insufficient_balance() {
        let mut fx = Fixture::new();
        fx.ledger().check_out(1, "alice").unwrap();
        fx.clock.advance(Duration::from_secs(6));
        fx.ledger().check_in("alice").unwrap();
        fx.users.get_user_mut("alice").unwrap().balance = 4;

        assert_eq!(
            fx.ledger().make_payment("alice").unwrap_err(),
            LedgerError::InsufficientBalance {
                available: 4,
                required: 10
            }
        );
        let user = fx.users.get_user("alice").unwrap();
        assert_eq!(user.debt, 10);
        assert_eq!(user.balance, 4);
        assert_eq!(fx.collected, 0);
    }
}
