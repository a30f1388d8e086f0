use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CarId, NO_CAR, Tokens};

/// External account identifier. Users are keyed by it; the owner is one too.
pub type AccountId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: AccountId,
    pub name: String,
    pub surname: String,
    /// Car currently rented, or [`NO_CAR`]
    pub rented_car_id: CarId,
    pub balance: Tokens,
    /// Accrued rent not yet paid
    pub debt: Tokens,
    /// When the current rental started
    pub rental_started_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: AccountId, name: String, surname: String) -> Self {
        Self {
            id,
            name,
            surname,
            rented_car_id: NO_CAR,
            balance: 0,
            debt: 0,
            rental_started_at: None,
        }
    }

    pub fn is_renting(&self) -> bool {
        self.rented_car_id != NO_CAR
    }

    pub fn rented_car(&self) -> Option<CarId> {
        self.is_renting().then_some(self.rented_car_id)
    }

    pub(crate) fn start_rental(&mut self, car_id: CarId, at: DateTime<Utc>) {
        self.rented_car_id = car_id;
        self.rental_started_at = Some(at);
    }

    pub(crate) fn end_rental(&mut self) {
        self.rented_car_id = NO_CAR;
        self.rental_started_at = None;
    }
}
