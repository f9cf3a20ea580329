pub mod coordinator;
pub mod gateway_client;
pub mod orchestrator;
pub mod retry;
