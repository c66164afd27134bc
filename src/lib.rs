/// Seamless programmatic wrapper around GDB's Machine Interface
///
/// Spawns or adopts a GDB subprocess running in MI mode, multiplexes its
/// single output stream into a structured request/response channel plus
/// asynchronous event streams, and exposes a typed API for breakpoints,
/// execution control, thread navigation, evaluation, and user-defined
/// command/event extensions.
///
/// ```no_run
/// use gdbmux::{Gdb, GdbEvent, SpawnOptions};
///
/// # async fn example() -> gdbmux::Result<()> {
/// let gdb = Gdb::spawn(SpawnOptions::default()).await?;
/// gdb.init().await?;
///
/// let mut events = gdb.events();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         if let GdbEvent::Stopped { reason, .. } = event {
///             println!("stopped: {:?}", reason);
///         }
///     }
/// });
///
/// gdb.add_break("hello.c", "main", None).await?;
/// gdb.run(None).await?;
/// # Ok(())
/// # }
/// ```
///
/// Note that GDB cannot tell target output apart from MI output when both
/// share one descriptor; give the inferior its own terminal
/// (`SpawnOptions::tty`) if target output matters.

use thiserror::Error;

pub mod commands;
mod communication;
pub mod events;
pub mod parser;
pub mod process;
mod scripts;
pub mod types;

pub use commands::{Gdb, Scope};
pub use events::GdbEvent;
pub use process::{GdbProcess, SpawnOptions};
pub use types::{
    Breakpoint, Frame, GlobalVar, Record, ResultClass, Thread, ThreadGroup, Value, Variable,
};

#[derive(Error, Debug)]
pub enum GdbError {
    #[error("failed to start GDB process: {0}")]
    ProcessStartError(#[from] std::io::Error),
    /// GDB answered `^error`. Carries the originating command text, the
    /// reported message, and the numeric error code when one was given.
    #[error("GDB command `{command}` failed: {msg}")]
    CommandFailed {
        command: String,
        msg: String,
        code: Option<i64>,
    },
    #[error("GDB process terminated unexpectedly")]
    ProcessTerminated,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, GdbError>;
