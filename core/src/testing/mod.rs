//! Testing utilities for llvc-core.
//!
//! Mocks and fixtures for exercising the engine without a model file or an
//! audio device.
//!
//! ## Usage
//!
//! ```rust
//! use llvc_core::session::StreamingSession;
//! use llvc_core::testing::{fixtures, MockStreamingModel};
//!
//! let mut session = StreamingSession::new(MockStreamingModel::new());
//! let out = session.process_block(&fixtures::noise(512, 1))?;
//! assert_eq!(out.len(), 512);
//! # Ok::<(), llvc_core::LlvcError>(())
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
