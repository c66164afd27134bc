/// High-level GDB interface
///
/// The [`Gdb`] facade serializes public operations behind a fair mutex,
/// formats MI and CLI commands (scope injection, the CLI-over-MI escape
/// convention), wraps thread-group switches in preserve-thread envelopes
/// and builds domain entities out of MI payloads. MI commands mutate
/// global debugger state, so at most one public operation is ever in
/// flight per wrapper instance.

use crate::communication::GdbCommunication;
use crate::events::GdbEvent;
use crate::parser;
use crate::process::{GdbProcess, SpawnOptions};
use crate::scripts;
use crate::types::{Breakpoint, Frame, GlobalVar, Thread, ThreadGroup, Value, Variable};
use crate::{GdbError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::broadcast;

/// Ceiling on injected script size; GDB rejects overlong command lines.
pub(crate) const MAX_SCRIPT_LEN: usize = 3500;

/// A thread or thread-group argument injected as an MI option for one
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Thread(u32),
    ThreadGroup(u32),
}

impl From<&Thread> for Scope {
    fn from(thread: &Thread) -> Self {
        Scope::Thread(thread.id)
    }
}

impl From<&ThreadGroup> for Scope {
    fn from(group: &ThreadGroup) -> Self {
        Scope::ThreadGroup(group.id)
    }
}

/// A GDB subprocess wrapped into a typed asynchronous API.
pub struct Gdb {
    comm: GdbCommunication,
    process: Option<GdbProcess>,
    op_lock: tokio::sync::Mutex<()>,
    async_mode: AtomicBool,
    globals: StdMutex<Option<Vec<GlobalVar>>>,
}

impl Gdb {
    /// Launch a GDB binary in MI mode and wrap it.
    pub async fn spawn(options: SpawnOptions) -> Result<Self> {
        let mut process = GdbProcess::start(&options)?;
        let stdin = process.take_stdin().ok_or_else(|| missing_stream("stdin"))?;
        let stdout = process.take_stdout().ok_or_else(|| missing_stream("stdout"))?;
        let stderr = process.take_stderr();

        let comm = GdbCommunication::new(stdout, stdin, options.raw_to_target);
        if let Some(stderr) = stderr {
            comm.spawn_stderr_reader(stderr);
        }
        Ok(Self::assemble(comm, Some(process)))
    }

    /// Adopt an already-spawned GDB process. The child must have been
    /// launched with `--interpreter=mi` and piped standard streams.
    pub fn adopt(child: Child, raw_to_target: bool) -> Result<Self> {
        let mut process = GdbProcess::adopt(child);
        let stdin = process.take_stdin().ok_or_else(|| missing_stream("stdin"))?;
        let stdout = process.take_stdout().ok_or_else(|| missing_stream("stdout"))?;
        let stderr = process.take_stderr();

        let comm = GdbCommunication::new(stdout, stdin, raw_to_target);
        if let Some(stderr) = stderr {
            comm.spawn_stderr_reader(stderr);
        }
        Ok(Self::assemble(comm, Some(process)))
    }

    /// Wrap raw byte streams. Useful when the caller manages the process
    /// itself; without a process handle, the non-async `interrupt` path is
    /// unavailable.
    pub fn from_streams<R, W>(stdout: R, stdin: W, raw_to_target: bool) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::assemble(GdbCommunication::new(stdout, stdin, raw_to_target), None)
    }

    fn assemble(comm: GdbCommunication, process: Option<GdbProcess>) -> Self {
        Gdb {
            comm,
            process,
            op_lock: tokio::sync::Mutex::new(()),
            async_mode: AtomicBool::new(false),
            globals: StdMutex::new(None),
        }
    }

    /// Subscribe to wrapper events. Every subscriber observes every event;
    /// reading is non-destructive for other subscribers.
    pub fn events(&self) -> broadcast::Receiver<GdbEvent> {
        self.comm.subscribe()
    }

    /// Whether the subprocess already terminated.
    pub fn is_terminated(&self) -> bool {
        self.comm.is_closed()
    }

    /// Inject the debugger-side helper scripts. Must run once before any
    /// CLI-based operation; re-running also drops the memoized globals
    /// listing.
    pub async fn init(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        for script in scripts::HELPERS {
            self.inject_script_inner(script).await?;
        }
        *self.globals.lock().unwrap() = None;
        Ok(())
    }

    /// Set an internal GDB variable (`-gdb-set`).
    pub async fn set(&self, param: &str, value: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm
            .send_mi(&format!("-gdb-set {} {}", param, value))
            .await?;
        Ok(())
    }

    /// Keep debugging both sides of a fork.
    pub async fn attach_on_fork(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm.send_mi("-gdb-set detach-on-fork off").await?;
        Ok(())
    }

    /// Enable asynchronous execution. Required before `interrupt` can use
    /// the MI path instead of a process signal.
    pub async fn enable_async(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        match self.comm.send_mi("-gdb-set mi-async on").await {
            Ok(_) => {}
            // `mi-async` superseded `target-async` in GDB 7.8.
            Err(GdbError::CommandFailed { .. }) => {
                self.comm.send_mi("-gdb-set target-async on").await?;
            }
            Err(err) => return Err(err),
        }
        self.async_mode.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Attach to a running process.
    pub async fn attach(&self, pid: u32) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm.send_mi(&format!("-target-attach {}", pid)).await?;
        Ok(())
    }

    /// Detach a thread group.
    pub async fn detach(&self, group: &ThreadGroup) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm
            .send_mi(&format!("-target-detach i{}", group.id))
            .await?;
        Ok(())
    }

    /// Detach a debuggee by its process id.
    pub async fn detach_pid(&self, pid: u32) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm.send_mi(&format!("-target-detach {}", pid)).await?;
        Ok(())
    }

    /// Interrupt execution. In async mode this is `-exec-interrupt`
    /// (scoped to everything, one thread, or one group); otherwise an
    /// interrupt signal goes to the subprocess, which requires a spawned
    /// or adopted process.
    pub async fn interrupt(&self, scope: Option<Scope>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        if !self.async_mode.load(Ordering::SeqCst) {
            return match &self.process {
                Some(process) => process.interrupt(),
                None => Err(GdbError::InvalidArgument(
                    "interrupting without async mode needs a spawned or adopted process"
                        .to_string(),
                )),
            };
        }
        let command = match scope {
            None => "-exec-interrupt --all".to_string(),
            Some(Scope::Thread(id)) => format!("-exec-interrupt --thread {}", id),
            Some(Scope::ThreadGroup(id)) => format!("-exec-interrupt --thread-group i{}", id),
        };
        self.comm.send_mi(&command).await?;
        Ok(())
    }

    /// List threads, optionally scoped to a thread or group.
    pub async fn threads(&self, scope: Option<Scope>) -> Result<Vec<Thread>> {
        let _guard = self.op_lock.lock().await;
        let data = self.send_mi_inner("-thread-info", scope).await?;
        Ok(data
            .get("threads")
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_tuple())
                    .filter_map(Thread::from_tuple)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// The currently selected thread, if any.
    pub async fn current_thread(&self) -> Result<Option<Thread>> {
        let _guard = self.op_lock.lock().await;
        self.current_thread_inner().await
    }

    /// Select a thread.
    pub async fn select_thread(&self, thread: &Thread) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm
            .send_mi(&format!("-thread-select {}", thread.id))
            .await?;
        Ok(())
    }

    /// List all thread groups (inferiors).
    pub async fn thread_groups(&self) -> Result<Vec<ThreadGroup>> {
        let _guard = self.op_lock.lock().await;
        self.thread_groups_inner().await
    }

    /// The currently selected thread group.
    pub async fn current_thread_group(&self) -> Result<ThreadGroup> {
        let _guard = self.op_lock.lock().await;
        let payload = self.exec_cmd_inner("group", None).await?;
        group_from_json(&payload).ok_or_else(|| {
            GdbError::MalformedResponse("group helper returned no thread group".to_string())
        })
    }

    /// Select a thread group.
    pub async fn select_thread_group(&self, group: &ThreadGroup) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.exec_cli_inner(&format!("inferior {}", group.id), None)
            .await?;
        Ok(())
    }

    /// Insert a breakpoint at `file:pos`, where `pos` is a line number or
    /// a function name.
    pub async fn add_break(
        &self,
        file: &str,
        pos: impl std::fmt::Display,
        thread: Option<&Thread>,
    ) -> Result<Breakpoint> {
        let _guard = self.op_lock.lock().await;
        self.insert_break_inner(&format!("{}:{}", file, pos), thread)
            .await
    }

    /// Insert a breakpoint on a function. Templates and overloads resolve
    /// to every matching location.
    pub async fn add_function_break(
        &self,
        function: &str,
        thread: Option<&Thread>,
    ) -> Result<Breakpoint> {
        let _guard = self.op_lock.lock().await;
        self.insert_break_inner(&format!("--function {}", function), thread)
            .await
    }

    /// Insert a breakpoint on a label.
    pub async fn add_label_break(
        &self,
        label: &str,
        thread: Option<&Thread>,
    ) -> Result<Breakpoint> {
        let _guard = self.op_lock.lock().await;
        self.insert_break_inner(&format!("--label {}", label), thread)
            .await
    }

    /// Insert a breakpoint from raw `-break-insert` options.
    pub async fn add_options_break(
        &self,
        options: &str,
        thread: Option<&Thread>,
    ) -> Result<Breakpoint> {
        let _guard = self.op_lock.lock().await;
        self.insert_break_inner(options, thread).await
    }

    /// Remove a breakpoint.
    pub async fn remove_break(&self, breakpoint: &Breakpoint) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm
            .send_mi(&format!("-break-delete {}", breakpoint.id))
            .await?;
        Ok(())
    }

    /// Step into the next line.
    pub async fn step_in(&self, scope: Option<Scope>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner("-exec-step", scope).await?;
        Ok(())
    }

    /// Run until the current function returns.
    pub async fn step_out(&self, scope: Option<Scope>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner("-exec-finish", scope).await?;
        Ok(())
    }

    /// Step over the next line.
    pub async fn next(&self, scope: Option<Scope>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner("-exec-next", scope).await?;
        Ok(())
    }

    /// Start the target from the beginning.
    pub async fn run(&self, group: Option<&ThreadGroup>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner("-exec-run", group.map(Scope::from))
            .await?;
        Ok(())
    }

    /// Continue execution.
    pub async fn proceed(&self, scope: Option<Scope>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner("-exec-continue", scope).await?;
        Ok(())
    }

    /// All symbols visible from the selected (or given) thread's frame.
    pub async fn context(&self, thread: Option<&Thread>) -> Result<Vec<Variable>> {
        let _guard = self.op_lock.lock().await;
        let payload = self
            .exec_cmd_inner("context", thread.map(Scope::from))
            .await?;
        serde_json::from_value(payload).map_err(|err| {
            GdbError::MalformedResponse(format!("context helper returned bad payload: {}", err))
        })
    }

    /// The call stack of the selected (or given) thread.
    pub async fn callstack(&self, thread: Option<&Thread>) -> Result<Vec<Frame>> {
        let _guard = self.op_lock.lock().await;
        let data = self
            .send_mi_inner("-stack-list-frames", thread.map(Scope::from))
            .await?;
        let frames = match data.get("stack") {
            Some(Value::Tuple(stack)) => match stack.get("frame") {
                Some(Value::List(items)) => items
                    .iter()
                    .filter_map(|v| v.as_tuple())
                    .filter_map(Frame::from_tuple)
                    .collect(),
                Some(Value::Tuple(single)) => Frame::from_tuple(single).into_iter().collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(frames)
    }

    /// Source files matching `pattern` (all files when absent), for one
    /// thread group or, without a group, across every group with
    /// first-occurrence order preserved.
    pub async fn source_files(
        &self,
        group: Option<&ThreadGroup>,
        pattern: Option<&str>,
    ) -> Result<Vec<String>> {
        let _guard = self.op_lock.lock().await;
        let pattern = pattern.unwrap_or("");
        match group {
            Some(group) => self.source_files_inner(Some(group.id), pattern).await,
            None => {
                let groups = self.thread_groups_inner().await?;
                let mut seen = HashSet::new();
                let mut files = Vec::new();
                for group in groups {
                    for file in self.source_files_inner(Some(group.id), pattern).await? {
                        if seen.insert(file.clone()) {
                            files.push(file);
                        }
                    }
                }
                Ok(files)
            }
        }
    }

    /// Evaluate an expression and return its display string.
    pub async fn evaluate(&self, expression: &str, scope: Option<Scope>) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        self.evaluate_inner(expression, scope).await
    }

    /// All global variables with their current values. The declaration
    /// list comes from `info variables` and is memoized until the next
    /// `init`.
    pub async fn globals(&self) -> Result<Vec<Variable>> {
        let _guard = self.op_lock.lock().await;
        let cached = self.globals.lock().unwrap().clone();
        let declarations = match cached {
            Some(list) => list,
            None => {
                let listing = self.exec_cli_inner("info variables", None).await?;
                let parsed = parser::parse_info_variables(&listing);
                *self.globals.lock().unwrap() = Some(parsed.clone());
                parsed
            }
        };

        let mut variables = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let value = self.evaluate_inner(&declaration.name, None).await?;
            variables.push(Variable {
                name: declaration.name,
                var_type: declaration.var_type,
                scope: "global".to_string(),
                value,
            });
        }
        Ok(variables)
    }

    /// Terminate the debugger.
    pub async fn exit(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.comm.send_mi("-gdb-exit").await?;
        Ok(())
    }

    /// Execute Python source inside the debugger and return its output.
    pub async fn exec_py(&self, source: &str, scope: Option<Scope>) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        validate_script(source)?;
        self.exec_cli_inner(&format!("python\n{}", source), scope)
            .await
    }

    /// Execute a CLI command and return its console output.
    pub async fn exec_cli(&self, command: &str, scope: Option<Scope>) -> Result<String> {
        let _guard = self.op_lock.lock().await;
        self.exec_cli_inner(command, scope).await
    }

    /// Execute a raw MI command and return the result payload.
    pub async fn exec_mi(
        &self,
        command: &str,
        scope: Option<Scope>,
    ) -> Result<HashMap<String, Value>> {
        let _guard = self.op_lock.lock().await;
        self.send_mi_inner(command, scope).await
    }

    /// Execute a wrapper-defined debugger command (`gdbjs-<name>`) and
    /// return its decoded JSON payload.
    pub async fn exec_cmd(
        &self,
        command: &str,
        scope: Option<Scope>,
    ) -> Result<serde_json::Value> {
        let _guard = self.op_lock.lock().await;
        self.exec_cmd_inner(command, scope).await
    }

    async fn inject_script_inner(&self, script: &str) -> Result<()> {
        validate_script(script)?;
        let payload = format!("python\n{}", script);
        let command = format!(
            "-interpreter-exec console \"{}\"",
            parser::encode_cstring(&payload)
        );
        self.comm.send_mi(&command).await?;
        Ok(())
    }

    /// Send an MI command with the scope injected as its first option.
    /// `--thread-group` silently changes the selected thread, so those
    /// sends run inside a preserve-thread envelope.
    async fn send_mi_inner(
        &self,
        command: &str,
        scope: Option<Scope>,
    ) -> Result<HashMap<String, Value>> {
        match scope {
            None => self.comm.send_mi(command).await,
            Some(scope @ Scope::Thread(_)) => {
                self.comm.send_mi(&inject_scope(command, scope)).await
            }
            Some(scope @ Scope::ThreadGroup(_)) => {
                let before = self.current_thread_inner().await?;
                let result = self.comm.send_mi(&inject_scope(command, scope)).await;
                self.restore_thread(before).await?;
                result
            }
        }
    }

    async fn exec_cli_inner(&self, command: &str, scope: Option<Scope>) -> Result<String> {
        match scope {
            None => self.comm.send_cli(command).await,
            Some(Scope::Thread(id)) => {
                self.comm
                    .send_cli(&format!("thread apply {} {}", id, command))
                    .await
            }
            Some(Scope::ThreadGroup(id)) => {
                let before = Box::pin(self.current_thread_inner()).await?;
                let result = match self.comm.send_cli(&format!("inferior {}", id)).await {
                    Ok(_) => self.comm.send_cli(command).await,
                    Err(err) => Err(err),
                };
                self.restore_thread(before).await?;
                result
            }
        }
    }

    async fn exec_cmd_inner(
        &self,
        command: &str,
        scope: Option<Scope>,
    ) -> Result<serde_json::Value> {
        let body = self
            .exec_cli_inner(&format!("gdbjs-{}", command), scope)
            .await?;
        // `thread apply` prepends a banner to the command output; skip to
        // the start of the JSON body.
        let trimmed = body.trim();
        let start = trimmed.find(|c| c == '{' || c == '[').unwrap_or(0);
        serde_json::from_str(&trimmed[start..]).map_err(|err| {
            GdbError::MalformedResponse(format!(
                "gdbjs-{} returned an undecodable payload: {}",
                command, err
            ))
        })
    }

    async fn current_thread_inner(&self) -> Result<Option<Thread>> {
        let payload = self.exec_cmd_inner("thread", None).await?;
        Ok(thread_from_json(&payload))
    }

    async fn restore_thread(&self, thread: Option<Thread>) -> Result<()> {
        if let Some(thread) = thread {
            self.comm
                .send_mi(&format!("-thread-select {}", thread.id))
                .await?;
        }
        Ok(())
    }

    async fn thread_groups_inner(&self) -> Result<Vec<ThreadGroup>> {
        let data = self.comm.send_mi("-list-thread-groups").await?;
        Ok(data
            .get("groups")
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_tuple())
                    .filter_map(ThreadGroup::from_tuple)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_break_inner(
        &self,
        location: &str,
        thread: Option<&Thread>,
    ) -> Result<Breakpoint> {
        let command = match thread {
            Some(thread) => format!("-break-insert -p {} {}", thread.id, location),
            None => format!("-break-insert {}", location),
        };
        let data = self.comm.send_mi(&command).await?;
        let mut breakpoint = Breakpoint::from_insert_result(&data).ok_or_else(|| {
            GdbError::MalformedResponse("break-insert reply carried no breakpoint".to_string())
        })?;
        if breakpoint.thread.is_none() {
            breakpoint.thread = thread.cloned();
        }
        Ok(breakpoint)
    }

    async fn source_files_inner(&self, group: Option<u32>, pattern: &str) -> Result<Vec<String>> {
        let payload = self
            .exec_cmd_inner(
                &format!("sources {}", pattern),
                group.map(Scope::ThreadGroup),
            )
            .await?;
        serde_json::from_value(payload).map_err(|err| {
            GdbError::MalformedResponse(format!("sources helper returned bad payload: {}", err))
        })
    }

    async fn evaluate_inner(&self, expression: &str, scope: Option<Scope>) -> Result<String> {
        let command = format!(
            "-data-evaluate-expression \"{}\"",
            parser::encode_cstring(expression)
        );
        let data = self.send_mi_inner(&command, scope).await?;
        data.get("value")
            .and_then(|v| v.as_string())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                GdbError::MalformedResponse("evaluation reply carried no value".to_string())
            })
    }
}

fn missing_stream(name: &str) -> GdbError {
    GdbError::ProcessStartError(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("failed to open GDB {}", name),
    ))
}

fn validate_script(script: &str) -> Result<()> {
    if script.trim().is_empty() {
        return Err(GdbError::InvalidArgument("script is empty".to_string()));
    }
    if script.len() > MAX_SCRIPT_LEN {
        return Err(GdbError::InvalidArgument(format!(
            "script is {} characters long, the limit is {}",
            script.len(),
            MAX_SCRIPT_LEN
        )));
    }
    Ok(())
}

/// Inject a scope option right after the command head.
fn inject_scope(command: &str, scope: Scope) -> String {
    let option = match scope {
        Scope::Thread(id) => format!("--thread {}", id),
        Scope::ThreadGroup(id) => format!("--thread-group i{}", id),
    };
    match command.split_once(' ') {
        Some((head, rest)) => format!("{} {} {}", head, option, rest),
        None => format!("{} {}", command, option),
    }
}

fn thread_from_json(payload: &serde_json::Value) -> Option<Thread> {
    let id = payload.get("id")?.as_u64()? as u32;
    Some(Thread {
        id,
        status: None,
        group: payload.get("group").and_then(group_from_json),
        frame: None,
    })
}

fn group_from_json(payload: &serde_json::Value) -> Option<ThreadGroup> {
    let id = payload.get("id")?.as_u64()? as u32;
    Some(ThreadGroup {
        id,
        executable: None,
        // The debugger reports pid 0 when the group has no live process.
        pid: payload
            .get("pid")
            .and_then(|p| p.as_u64())
            .filter(|pid| *pid != 0)
            .map(|pid| pid as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_thread_scope_after_head() {
        assert_eq!(
            inject_scope("-stack-list-frames 0 4", Scope::Thread(2)),
            "-stack-list-frames --thread 2 0 4"
        );
        assert_eq!(
            inject_scope("-exec-step", Scope::Thread(7)),
            "-exec-step --thread 7"
        );
    }

    #[test]
    fn test_inject_thread_group_reattaches_prefix() {
        assert_eq!(
            inject_scope("-exec-run", Scope::ThreadGroup(1)),
            "-exec-run --thread-group i1"
        );
    }

    #[test]
    fn test_scope_from_entities() {
        assert_eq!(Scope::from(&Thread::new(3)), Scope::Thread(3));
        assert_eq!(Scope::from(&ThreadGroup::new(2)), Scope::ThreadGroup(2));
    }

    #[test]
    fn test_validate_script_rejects_empty_and_oversized() {
        assert!(matches!(
            validate_script("   "),
            Err(GdbError::InvalidArgument(_))
        ));
        let oversized = "x".repeat(MAX_SCRIPT_LEN + 1);
        assert!(matches!(
            validate_script(&oversized),
            Err(GdbError::InvalidArgument(_))
        ));
        assert!(validate_script("print('ok')").is_ok());
    }

    #[test]
    fn test_thread_from_json() {
        let payload: serde_json::Value =
            serde_json::from_str(r#"{"id": 2, "group": {"id": 1, "pid": 28655}}"#).unwrap();
        let thread = thread_from_json(&payload).unwrap();
        assert_eq!(thread.id, 2);
        let group = thread.group.unwrap();
        assert_eq!(group.id, 1);
        assert_eq!(group.pid, Some(28655));
    }

    #[test]
    fn test_thread_from_json_null_id_means_no_thread() {
        let payload: serde_json::Value =
            serde_json::from_str(r#"{"id": null, "group": {"id": 1, "pid": 0}}"#).unwrap();
        assert!(thread_from_json(&payload).is_none());
    }

    #[test]
    fn test_group_pid_zero_means_not_running() {
        let payload: serde_json::Value =
            serde_json::from_str(r#"{"id": 1, "pid": 0}"#).unwrap();
        let group = group_from_json(&payload).unwrap();
        assert_eq!(group.pid, None);
    }
}
