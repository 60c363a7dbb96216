mod dispatcher;
mod lane;
mod registry;

pub use dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use lane::{MAX_PENDING_TRANSACTIONS, Offer, TransactionLane};
pub use registry::{Pending, Registry, RegistryError};
