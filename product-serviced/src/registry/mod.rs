pub mod client;
pub mod error;
pub mod heartbeat;
pub mod instance;
pub mod lifecycle;

#[cfg(test)]
pub mod testing;

pub use client::EurekaClient;
pub use instance::{generate_instance_id, InstanceRecord};
pub use lifecycle::{start_client, LifecycleState, Timings};
