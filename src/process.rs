/// Process management for GDB
///
/// Spawns the GDB subprocess in MI mode and carries the platform-specific
/// interrupt-signal delivery used when asynchronous execution was not
/// enabled.

use crate::Result;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Options for launching a GDB subprocess.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Path to the GDB binary.
    pub gdb_path: String,
    /// Extra arguments appended after `--interpreter=mi`.
    pub args: Vec<String>,
    /// Terminal for the inferior (`--tty=...`). Without a separate TTY the
    /// target's output shares GDB's descriptor and cannot be told apart
    /// from MI output, so set this whenever target output matters.
    pub tty: Option<String>,
    /// Route `(gdb) ` prompts and unparsed lines onto the target stream
    /// instead of discarding them.
    pub raw_to_target: bool,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        SpawnOptions {
            gdb_path: "gdb".to_string(),
            args: Vec::new(),
            tty: None,
            raw_to_target: false,
        }
    }
}

pub struct GdbProcess {
    child: Child,
}

impl GdbProcess {
    /// Start a new GDB process with the MI interface. Must be called from
    /// within a Tokio runtime.
    pub fn start(options: &SpawnOptions) -> Result<Self> {
        log::debug!("starting GDB process: {}", options.gdb_path);

        let mut command = Command::new(&options.gdb_path);
        command.arg("--interpreter=mi");
        if let Some(tty) = &options.tty {
            command.arg(format!("--tty={}", tty));
        }
        let child = command
            .args(&options.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        log::debug!("GDB process started with PID: {:?}", child.id());

        Ok(GdbProcess { child })
    }

    /// Wrap an already-spawned GDB process.
    pub fn adopt(child: Child) -> Self {
        GdbProcess { child }
    }

    /// Get the process ID
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Take stdin handle
    pub fn take_stdin(&mut self) -> Option<tokio::process::ChildStdin> {
        self.child.stdin.take()
    }

    /// Take stdout handle
    pub fn take_stdout(&mut self) -> Option<tokio::process::ChildStdout> {
        self.child.stdout.take()
    }

    /// Take stderr handle
    pub fn take_stderr(&mut self) -> Option<tokio::process::ChildStderr> {
        self.child.stderr.take()
    }

    /// Deliver an interrupt signal to the GDB process.
    pub fn interrupt(&self) -> Result<()> {
        match self.id() {
            Some(pid) => {
                log::debug!("sending interrupt to GDB PID: {}", pid);
                send_interrupt_signal(pid)
            }
            None => Err(crate::GdbError::ProcessTerminated),
        }
    }
}

#[cfg(unix)]
fn send_interrupt_signal(pid: u32) -> Result<()> {
    let result = unsafe { libc::kill(pid as i32, libc::SIGINT) };
    if result != 0 {
        log::error!("failed to send SIGINT to PID {}", pid);
        return Err(crate::GdbError::InvalidArgument(format!(
            "failed to send SIGINT to PID {}",
            pid
        )));
    }
    Ok(())
}

#[cfg(windows)]
fn send_interrupt_signal(pid: u32) -> Result<()> {
    use winapi::um::wincon::{GenerateConsoleCtrlEvent, CTRL_C_EVENT};

    let result = unsafe { GenerateConsoleCtrlEvent(CTRL_C_EVENT, pid) };
    if result == 0 {
        log::error!("GenerateConsoleCtrlEvent failed for PID {}", pid);
        return Err(crate::GdbError::InvalidArgument(format!(
            "failed to send Ctrl+C event to PID {}",
            pid
        )));
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn send_interrupt_signal(_pid: u32) -> Result<()> {
    Err(crate::GdbError::InvalidArgument(
        "interrupt signals are not supported on this platform".to_string(),
    ))
}
