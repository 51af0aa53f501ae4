//! # Sysfs Utility Integration
//!
//! Everything needed to talk to the local `mts-io-sysfs` device-control
//! utility: the value convention it speaks, the argument lists it expects and
//! a bounded way to run it.
//!
//! ```text
//! sysfs/
//! ├── codec.rs     - JSON scalar <-> textual on/off/numeric values
//! ├── command.rs   - operation tokens and argument list construction
//! ├── executor.rs  - process invocation with timeout
//! └── error.rs     - operation and execution errors
//! ```
//!
//! The utility is treated as an opaque program: it receives
//! `[show|store, <port>/<object>, <value>?]`, prints the current value on
//! success and exits nonzero with a message on stderr on failure.

pub mod codec;
pub mod command;
pub mod error;
pub mod executor;

pub use codec::ObjectValue;
pub use command::Operation;
pub use error::{ExecError, OperationError};
pub use executor::{CommandRunner, SysfsTool};

/// Program name of the device-control utility
pub const SYSFS_PROGRAM: &str = "mts-io-sysfs";
