// Application layer - authorization, serialization and persistence of
// ledger operations. Clients only talk to `RentalService`.

pub mod config;
pub mod error;
pub mod service;

pub use config::*;
pub use error::*;
pub use service::*;
