use serde::{Deserialize, Serialize};

use super::{AccountId, LedgerError, Tokens, ensure_non_negative};

pub type CarId = i64;

/// Sentinel stored in [`super::User::rented_car_id`] when no car is rented.
/// Real car ids start at 1.
pub const NO_CAR: CarId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarStatus {
    /// Retired or otherwise withdrawn from rental
    Unavailable,
    /// Checked out by a user
    Rented,
    /// Ready to be checked out
    Available,
}

impl CarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarStatus::Unavailable => "unavailable",
            CarStatus::Rented => "rented",
            CarStatus::Available => "available",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unavailable" => Some(CarStatus::Unavailable),
            "rented" => Some(CarStatus::Rented),
            "available" => Some(CarStatus::Available),
            _ => None,
        }
    }

    /// Numeric status code (0 = unavailable, 1 = rented, 2 = available).
    pub fn code(&self) -> u8 {
        match self {
            CarStatus::Unavailable => 0,
            CarStatus::Rented => 1,
            CarStatus::Available => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CarStatus::Unavailable),
            1 => Some(CarStatus::Rented),
            2 => Some(CarStatus::Available),
            _ => None,
        }
    }
}

impl std::fmt::Display for CarStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CarStatus {
    type Err = LedgerError;

    /// Accepts a status name or its numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.trim().parse::<u8>() {
            Ok(code) => CarStatus::from_code(code),
            Err(_) => CarStatus::from_name(s.trim()),
        };
        parsed.ok_or_else(|| LedgerError::InvalidStatus(s.to_string()))
    }
}

/// The owner-editable part of a car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarMetadata {
    pub name: String,
    pub img_url: String,
    pub rent_fee: Tokens,
    /// Informational only; the rental flow never reads it
    pub sale_fee: Tokens,
}

impl CarMetadata {
    pub fn new(
        name: impl Into<String>,
        img_url: impl Into<String>,
        rent_fee: Tokens,
        sale_fee: Tokens,
    ) -> Self {
        Self {
            name: name.into(),
            img_url: img_url.into(),
            rent_fee,
            sale_fee,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        ensure_non_negative(self.rent_fee, "rent fee")?;
        ensure_non_negative(self.sale_fee, "sale fee")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub name: String,
    pub img_url: String,
    pub rent_fee: Tokens,
    pub sale_fee: Tokens,
    pub status: CarStatus,
    /// Set by check-out, cleared by check-in
    pub renter_id: Option<AccountId>,
}

impl Car {
    pub fn new(id: CarId, metadata: CarMetadata) -> Self {
        Self {
            id,
            name: metadata.name,
            img_url: metadata.img_url,
            rent_fee: metadata.rent_fee,
            sale_fee: metadata.sale_fee,
            status: CarStatus::Available,
            renter_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == CarStatus::Available
    }

    pub fn metadata(&self) -> CarMetadata {
        CarMetadata::new(&self.name, &self.img_url, self.rent_fee, self.sale_fee)
    }

    pub(crate) fn apply_metadata(&mut self, metadata: CarMetadata) {
        self.name = metadata.name;
        self.img_url = metadata.img_url;
        self.rent_fee = metadata.rent_fee;
        self.sale_fee = metadata.sale_fee;
    }
}
