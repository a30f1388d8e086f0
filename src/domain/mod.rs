mod balance;
mod car;
mod cars;
mod clock;
mod error;
mod ledger;
mod money;
mod rental;
mod rules;
mod user;
mod users;

pub use balance::*;
pub use car::*;
pub use cars::*;
pub use clock::*;
pub use error::*;
pub use ledger::*;
pub use money::*;
pub use rental::*;
pub use rules::*;
pub use user::*;
pub use users::*;
