use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can surface.
///
/// Errors fall into three groups that mirror how the crate is layered:
///
/// ## Class format and bytecode errors
/// - [`Error::Malformed`] - Corrupted or structurally invalid class data
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input buffer
/// - [`Error::UnknownOpcode`] - Unrecognized instruction byte in a method body
/// - [`Error::PoolIndex`] - Constant pool reference out of range or of the wrong kind
/// - [`Error::Verification`] - A method body failed structural verification
///
/// ## Reflective adapter errors
/// - [`Error::StructuralMismatch`] - No member of the expected shape on the host class
/// - [`Error::InvocationFailure`] - Member found but the call failed or returned an
///   unexpected shape
///
/// These two never reach API callers: every adapter accessor recovers locally and
/// returns its documented default. They exist so the recovery sites have something
/// precise to log.
///
/// ## Synchronization errors
/// - [`Error::LockPoisoned`] - A shared registry lock was poisoned by a panic
///
/// Note what is deliberately *not* here: a transform rule whose pattern matches
/// nothing in a loaded class is a silent skip, and a rejected handshake is a
/// policy outcome ([`JoinDecision::Reject`](crate::handshake::JoinDecision::Reject))
/// surfaced to the connecting user - neither is an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The class data is damaged and could not be parsed.
    ///
    /// Includes the source location where the malformation was detected,
    /// which matters when the same structural check appears in several
    /// parsing paths.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing class data.
    #[error("Out of bound read would have occurred!")]
    OutOfBounds,

    /// An instruction byte did not map to any known opcode.
    #[error("Unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// A constant pool index was out of range, or the entry at that index
    /// was of a different kind than the instruction requires.
    #[error("Invalid constant pool reference - index {0}")]
    PoolIndex(u16),

    /// A method body failed structural verification.
    ///
    /// The offset identifies the instruction at which the operand stack or
    /// local variable state became inconsistent.
    #[error("Verification failed at offset {offset}: {message}")]
    Verification {
        /// Byte offset of the offending instruction within the method body
        offset: u32,
        /// What the verifier found inconsistent
        message: String,
    },

    /// No member matching the expected structural signature exists on the
    /// host class.
    ///
    /// This is the signature-drift failure mode: the pinned name and shape
    /// for a logical operation no longer match the host build being run.
    /// The adapter layer recovers by returning the operation's documented
    /// default.
    #[error("No structural match for '{operation}' on host class '{class}'")]
    StructuralMismatch {
        /// Name of the concrete host class that was scanned
        class: String,
        /// The logical operation that could not be bound
        operation: String,
    },

    /// A located member was invoked but the call failed, or its result had a
    /// shape the adapter could not use.
    ///
    /// Recovered exactly like [`Error::StructuralMismatch`] - the operation
    /// returns its documented default.
    #[error("Invoking '{operation}' on host class '{class}' failed: {message}")]
    InvocationFailure {
        /// Name of the concrete host class the call was made against
        class: String,
        /// The logical operation that was being performed
        operation: String,
        /// Why the invocation failed
        message: String,
    },

    /// Failed to lock a shared registry.
    #[error("Failed to lock target")]
    LockPoisoned,
}
