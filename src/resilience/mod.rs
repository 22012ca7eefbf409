//! # Resilience Primitives Module
//!
//! Bounding and pacing of backend calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`deadline`] | `with_deadline` combinator: first of {result, cancellation, deadline} |
//! | [`debounce`] | Minimum interval between accepted sends |
//!
//! ## Deadline
//!
//! The operation receives an [`OperationContext`] carrying a cancellation token and a
//! capture slot. A final value stored in the slot survives the deadline: if the timer
//! fires while the operation is still cleaning up, the captured value is returned
//! instead of a timeout.
//!
//! ```rust
//! use agent_session::resilience::deadline::with_deadline;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> agent_session::Result<()> {
//! let parent = CancellationToken::new();
//! let value = with_deadline("demo", Duration::from_secs(5), &parent, |ctx| async move {
//!     ctx.capture(42u32);
//!     Ok(42u32)
//! })
//! .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod debounce;
pub mod deadline;

pub use deadline::{with_deadline, Capture, OperationContext};
pub use debounce::Debounce;
