//! Kernel error types.
//!
//! Process launches and HTTP transport failures surface through
//! [`KernelError`].  A non-zero exit code is *not* an error at this layer:
//! it is reported in [`crate::CommandOutput`] and interpreted by callers.

/// Unified error type for the SkillPad kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Process errors -----------------------------------------------------
    /// The program could not be started (not found, permission denied, bad cwd).
    #[error("failed to launch `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    /// The program started but waiting for it or collecting output failed.
    #[error("process `{program}` failed: {reason}")]
    Wait { program: String, reason: String },

    /// The command queue worker is gone and will not accept new work.
    #[error("command queue is closed")]
    QueueClosed,

    // -- Transport errors ---------------------------------------------------
    /// The HTTP request never produced a response (DNS, TLS, connect, body read).
    #[error("network error: {0}")]
    Transport(String),

    /// A response body could not be decoded as the expected JSON shape.
    #[error("invalid response body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
