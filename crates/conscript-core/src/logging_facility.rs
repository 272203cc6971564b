//! Structured logging for the draft engine
//!
//! - [`init`] installs the process-wide subscriber for a [`Profile`]
//! - `log_op_start!`, `log_op_end!`, `log_op_error!` give every engine
//!   operation the same start/end/end_error event shape
//! - [`test_capture`] records events in memory for assertions
//!
//! ```rust
//! use conscript_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
