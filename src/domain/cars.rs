use std::collections::BTreeMap;

use super::{Car, CarId, CarMetadata, CarStatus, LedgerError};

/// Registered cars keyed by sequential id.
#[derive(Debug, Clone)]
pub struct CarRegistry {
    cars: BTreeMap<CarId, Car>,
    next_id: CarId,
}

impl Default for CarRegistry {
    fn default() -> Self {
        Self {
            cars: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl CarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted records and the stored id counter.
    /// The counter is bumped past any loaded id.
    pub fn from_parts(cars: impl IntoIterator<Item = Car>, next_id: CarId) -> Self {
        let cars: BTreeMap<CarId, Car> = cars.into_iter().map(|c| (c.id, c)).collect();
        let past_last = cars.keys().next_back().map_or(1, |id| id + 1);
        Self {
            cars,
            next_id: next_id.max(past_last),
        }
    }

    /// Register a car under the next id. New cars are available.
    pub fn add_car(&mut self, metadata: CarMetadata) -> Result<&Car, LedgerError> {
        metadata.validate()?;
        let id = self.next_id;
        self.next_id += 1;
        Ok(self.cars.entry(id).or_insert(Car::new(id, metadata)))
    }

    pub fn get_car(&self, id: CarId) -> Result<&Car, LedgerError> {
        self.cars.get(&id).ok_or(LedgerError::CarNotFound(id))
    }

    pub(crate) fn get_car_mut(&mut self, id: CarId) -> Result<&mut Car, LedgerError> {
        self.cars.get_mut(&id).ok_or(LedgerError::CarNotFound(id))
    }

    /// Overwrite name, image url and both fees together.
    pub fn edit_car_metadata(
        &mut self,
        id: CarId,
        metadata: CarMetadata,
    ) -> Result<&Car, LedgerError> {
        metadata.validate()?;
        let car = self.get_car_mut(id)?;
        car.apply_metadata(metadata);
        Ok(car)
    }

    /// Overwrite the status. `Rented` is only reachable through check-out.
    /// An active rental is not checked.
    pub fn edit_car_status(&mut self, id: CarId, status: CarStatus) -> Result<&Car, LedgerError> {
        if status == CarStatus::Rented {
            return Err(LedgerError::InvalidStatus(
                "rented is set by check-out only".to_string(),
            ));
        }
        let car = self.get_car_mut(id)?;
        car.status = status;
        Ok(car)
    }

    pub fn cars_by_status(&self, status: CarStatus) -> Vec<&Car> {
        self.cars.values().filter(|c| c.status == status).collect()
    }

    pub fn car_count(&self) -> usize {
        self.cars.len()
    }

    /// Id the next added car will receive.
    pub fn next_id(&self) -> CarId {
        self.next_id
    }

    /// Cars in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Car> {
        self.cars.values()
    }
}
