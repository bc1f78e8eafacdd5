//! # atelier_client
//!
//! Async HTTP client for the generation backend shared by PixelPainter and
//! WordWeaver, plus the latest-wins gate used to supersede requests.
//!
//! ```no_run
//! # async fn demo() -> Result<(), atelier_client::ClientError> {
//! use atelier::generation::{GenerationRequest, SamplingParams};
//! use atelier_client::BackendClient;
//!
//! let client = BackendClient::builder()
//!     .base_url("http://localhost:8000")
//!     .build()?;
//! let result = client
//!     .generate_frames(&GenerationRequest::new("A red fox", SamplingParams::default()))
//!     .await?;
//! println!("{} frames", result.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod gate;
pub mod types;

pub use client::{BackendClient, BackendClientBuilder, InspectOptions};
pub use error::{ClientError, Result};
pub use gate::{RequestGate, Ticket};
