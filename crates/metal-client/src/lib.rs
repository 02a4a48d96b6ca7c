//! metal-api REST Client
//!
//! A Rust client library for the metal-stack metal-api, covering the calls a
//! Cluster API infrastructure provider needs.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::{MetalClient, NetworkAllocateRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetalClient::new(
//!     "http://metal-api:8080".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let network = client
//!     .allocate_network(NetworkAllocateRequest {
//!         name: Some("my-cluster".to_string()),
//!         projectid: "my-project".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("allocated {}", network.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod metal_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::MetalClient;
pub use common::HttpClient;
pub use error::MetalError;
pub use models::*;
pub use metal_trait::MetalClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockMetalClient, Operation};
