pub mod sandbox;

pub use sandbox::{InMemoryFulfillment, InMemoryInventory, SandboxGateway};
