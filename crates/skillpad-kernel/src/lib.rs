//! SkillPad kernel.
//!
//! The lowest layer of the SkillPad workspace:
//!
//! - **[`queue`]** -- exclusive command queue.  One worker task launches
//!   external processes strictly one at a time, in submission order, and
//!   routes each outcome back to its own caller.
//! - **[`process`]** -- the [`ProcessRunner`] seam and its `tokio::process`
//!   implementation.
//! - **[`http`]** -- the [`HttpTransport`] seam and its `reqwest`
//!   implementation.
//! - **[`ansi`]** -- terminal escape stripping for captured output.
//! - **[`error`]** -- unified kernel error types via [`thiserror`].
//!
//! With the `test-util` feature, [`testing`] provides scripted stand-ins for
//! both seams.

pub mod ansi;
pub mod error;
pub mod http;
pub mod process;
pub mod queue;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use ansi::strip_ansi;
pub use error::{KernelError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use process::{CommandOutput, CommandSpec, ProcessRunner, TokioProcessRunner};
pub use queue::CommandQueue;
