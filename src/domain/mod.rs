//! Pure business core: no I/O, no clocks other than timestamps passed in
//! or captured at creation, no gateway SDKs.

pub mod cart;
pub mod compliance;
pub mod money;
pub mod routing;
pub mod saga;
pub mod split;
pub mod transaction;

pub use money::{Currency, FxSnapshot, Money};
pub use routing::GatewayId;
pub use saga::{BookingEvent, BookingSaga, BookingState};
pub use transaction::{Transaction, TransactionStatus};
