use thiserror::Error;

use crate::resolve::UnknownKind;

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

macro_rules! unsupported {
    // Single string version
    ($msg:expr) => {
        crate::Error::UnsupportedConstruct {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::UnsupportedConstruct {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// A request for interesting inputs either completes or fails with exactly one of these
/// variants. Infeasible paths are not errors; they are dropped inside the per-path task.
///
/// # Error Categories
///
/// ## Terminal pipeline failures
/// - [`Error::UnresolvedReference`] - A type or method could not be encoded by any resolver
/// - [`Error::UnsupportedConstruct`] - An operation or model expression has no encoder/decoder
///
/// ## Input and contract errors
/// - [`Error::Malformed`] - Unparsable solver output or an inconsistent model
/// - [`Error::InvalidIdentity`] - A handle or identity that does not belong to its table
/// - [`Error::RecursionLimit`] - The inlining call stack exceeded its configured bound
///
/// ## External errors
/// - [`Error::Solver`] - The solver process failed or answered something unexpected
/// - [`Error::FileError`] - I/O failures while talking to the solver process
///
/// # Examples
///
/// ```rust,no_run
/// use dotprobe::{Error, Generator, model::InMemoryProvider};
/// # fn run(generator: &Generator, method: &dotprobe::model::MethodRef) {
/// match generator.interesting_inputs(method) {
///     Ok(inputs) => println!("{} inputs", inputs.len()),
///     Err(Error::UnresolvedReference { kind, items }) => {
///         eprintln!("unresolved {kind}: {}", items.join(", "));
///     }
///     Err(e) => eprintln!("failed: {e}"),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Every offered resolver failed for a candidate and the confirmation was cancelled.
    ///
    /// Carries every item that was still unresolved at the moment of cancellation, not only
    /// the candidate being confirmed.
    #[error("Unresolved {kind} references: {}", items.join(", "))]
    UnresolvedReference {
        /// Whether types or methods were being resolved
        kind: UnknownKind,
        /// All items still unresolved when the confirmation was cancelled
        items: Vec<String>,
    },

    /// An instruction, opcode or model expression has no encoder or decoder.
    ///
    /// This signals a gap in construct coverage, never a data problem, and is not retried.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the unsupported construct
    /// * `file` - Source file where the error was raised
    /// * `line` - Source line where the error was raised
    #[error("Unsupported - {file}:{line}: {message}")]
    UnsupportedConstruct {
        /// The message to be printed for the Unsupported error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Solver output or a solver model could not be interpreted.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An entity was requested through an identity that is invalid for its table.
    ///
    /// This is a contract violation of the caller (a block index that does not exist, a
    /// variable that was never declared, a duplicate name), not a recoverable condition.
    #[error("Invalid identity - {0}")]
    InvalidIdentity(String),

    /// Recursion limit reached.
    ///
    /// The associated value shows the call depth limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The external solver failed.
    #[error("Solver failure - {0}")]
    Solver(String),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors raised while spawning or feeding the solver process.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
