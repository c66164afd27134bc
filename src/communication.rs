/// Communication layer for the GDB/MI protocol
///
/// Owns the subprocess byte streams: a reader task splits standard output
/// into lines, parses each one and routes it: async records onto the
/// event bus, result records onto the FIFO request queue, console records
/// additionally through the CLI echo correlator and the embedded-event
/// scanner. Requests never time out here; if GDB stays silent the request
/// stays pending.

use crate::events::{self, GdbEvent};
use crate::parser;
use crate::types::{Record, ResultClass, Value};
use crate::{GdbError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, oneshot};

/// Magic prefix the debugger-side `concat` helper prepends to the console
/// echo of a CLI command.
pub(crate) const MAGIC_PREFIX: &str = "GDBJS^";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A CLI request resolves only once both its result record and its framed
/// console echo have arrived, in either order.
struct CliState {
    body: Option<String>,
    done: bool,
    tx: Option<oneshot::Sender<Result<String>>>,
}

enum Pending {
    Mi {
        command: String,
        tx: oneshot::Sender<Result<HashMap<String, Value>>>,
    },
    Cli {
        command: String,
        state: Arc<Mutex<CliState>>,
    },
}

#[derive(Default)]
struct Queues {
    /// Every in-flight request, consumed in lockstep with result records.
    requests: VecDeque<Pending>,
    /// The CLI subset, consumed in lockstep with magic-prefixed echoes.
    echoes: VecDeque<Arc<Mutex<CliState>>>,
}

struct Shared {
    queues: Mutex<Queues>,
    events: broadcast::Sender<GdbEvent>,
    closed: AtomicBool,
    raw_to_target: bool,
}

/// Manages the byte streams of one GDB subprocess.
pub(crate) struct GdbCommunication {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    shared: Arc<Shared>,
}

impl GdbCommunication {
    /// Wire up the communication layer and spawn the reader task. Must be
    /// called from within a Tokio runtime.
    pub(crate) fn new<R, W>(stdout: R, stdin: W, raw_to_target: bool) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues::default()),
            events,
            closed: AtomicBool::new(false),
            raw_to_target,
        });

        let reader_shared = shared.clone();
        tokio::spawn(async move {
            read_loop(stdout, reader_shared).await;
        });

        GdbCommunication {
            writer: tokio::sync::Mutex::new(Box::new(stdin)),
            shared,
        }
    }

    /// Subscribe to the event bus. Every subscriber sees every event.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<GdbEvent> {
        self.shared.events.subscribe()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Route GDB's stderr onto the log stream, line by line.
    pub(crate) fn spawn_stderr_reader<R>(&self, stderr: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let events = self.shared.events.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
                        if !trimmed.is_empty() {
                            let _ = events.send(GdbEvent::Log(trimmed.to_string()));
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    /// Send a raw MI command and wait for its result record.
    pub(crate) async fn send_mi(&self, command: &str) -> Result<HashMap<String, Value>> {
        self.ensure_open()?;

        let (tx, rx) = oneshot::channel();
        {
            let mut queues = self.shared.queues.lock().unwrap();
            queues.requests.push_back(Pending::Mi {
                command: command.to_string(),
                tx,
            });
        }

        if let Err(err) = self.write_line(command).await {
            self.shared.queues.lock().unwrap().requests.pop_back();
            return Err(err);
        }

        rx.await.map_err(|_| GdbError::ProcessTerminated)?
    }

    /// Send a CLI command through the `concat` escape convention and wait
    /// for both its result record and its prefixed console echo.
    pub(crate) async fn send_cli(&self, command: &str) -> Result<String> {
        self.ensure_open()?;

        let wrapped = format!(
            "-interpreter-exec console \"concat {} {}\"",
            MAGIC_PREFIX,
            parser::encode_cstring(command)
        );

        let (tx, rx) = oneshot::channel();
        let state = Arc::new(Mutex::new(CliState {
            body: None,
            done: false,
            tx: Some(tx),
        }));
        {
            let mut queues = self.shared.queues.lock().unwrap();
            queues.requests.push_back(Pending::Cli {
                command: command.to_string(),
                state: state.clone(),
            });
            queues.echoes.push_back(state.clone());
        }

        if let Err(err) = self.write_line(&wrapped).await {
            let mut queues = self.shared.queues.lock().unwrap();
            queues.requests.pop_back();
            queues.echoes.pop_back();
            return Err(err);
        }

        rx.await.map_err(|_| GdbError::ProcessTerminated)?
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(GdbError::ProcessTerminated);
        }
        Ok(())
    }

    async fn write_line(&self, command: &str) -> Result<()> {
        log::debug!("SEND: {}", command);
        let mut writer = self.writer.lock().await;
        writer
            .write_all(command.as_bytes())
            .await
            .map_err(|_| GdbError::ProcessTerminated)?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|_| GdbError::ProcessTerminated)?;
        writer.flush().await.map_err(|_| GdbError::ProcessTerminated)?;
        Ok(())
    }
}

async fn read_loop<R>(stdout: R, shared: Arc<Shared>)
where
    R: AsyncRead + Send + Unpin,
{
    log::debug!("GDB stdout reader started");
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                // A partial trailing line before EOF arrives here without
                // its terminator and is handled like any other line.
                let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
                if trimmed.is_empty() {
                    continue;
                }
                log::debug!("RECV: {}", trimmed);
                handle_line(trimmed, &shared);
            }
            Err(err) => {
                log::error!("GDB stdout read error: {}", err);
                break;
            }
        }
    }

    log::debug!("GDB stdout reader finished");
    terminate(&shared);
}

fn handle_line(line: &str, shared: &Arc<Shared>) {
    let record = parser::parse_line(line);
    match record {
        Record::Result { class, data, .. } => handle_result(shared, class, data),
        Record::Exec { .. } | Record::Status { .. } | Record::Notify { .. } => {
            for event in events::synthesize(&record) {
                let _ = shared.events.send(event);
            }
        }
        Record::Console(text) => handle_console(shared, &text),
        Record::Target(text) => {
            let _ = shared.events.send(GdbEvent::Target(text));
        }
        Record::Log(text) => {
            let _ = shared.events.send(GdbEvent::Log(text));
        }
        Record::Prompt => {
            if shared.raw_to_target {
                let _ = shared.events.send(GdbEvent::Target("(gdb) ".to_string()));
            }
        }
        Record::Raw(text) => {
            if shared.raw_to_target {
                let _ = shared.events.send(GdbEvent::Target(text));
            } else {
                log::trace!("discarding unparsed line: {}", text);
            }
        }
    }
}

fn handle_console(shared: &Arc<Shared>, text: &str) {
    // Scripts may surface events anywhere in the console stream, CLI
    // echoes included.
    for (name, payload) in events::extract_events(text) {
        let _ = shared.events.send(events::script_event(name, payload));
    }

    if let Some(body) = text.strip_prefix(MAGIC_PREFIX) {
        deliver_echo(shared, events::strip_frames(body));
        return;
    }

    let cleaned = events::strip_frames(text);
    if !cleaned.is_empty() {
        let _ = shared.events.send(GdbEvent::Console(cleaned));
    }
}

fn handle_result(shared: &Arc<Shared>, class: ResultClass, data: HashMap<String, Value>) {
    let pending = shared.queues.lock().unwrap().requests.pop_front();
    match pending {
        None => log::warn!("result record with no pending request"),
        Some(Pending::Mi { command, tx }) => {
            let outcome = if class == ResultClass::Error {
                Err(command_error(command, &data))
            } else {
                Ok(data)
            };
            let _ = tx.send(outcome);
        }
        Some(Pending::Cli { command, state }) => {
            if class == ResultClass::Error {
                // A failed CLI command never echoes; drop its echo slot so
                // later echoes keep pairing with the right requests.
                {
                    let mut queues = shared.queues.lock().unwrap();
                    queues.echoes.retain(|slot| !Arc::ptr_eq(slot, &state));
                }
                let mut slot = state.lock().unwrap();
                if let Some(tx) = slot.tx.take() {
                    let _ = tx.send(Err(command_error(command, &data)));
                }
            } else {
                let mut slot = state.lock().unwrap();
                slot.done = true;
                if let Some(body) = slot.body.take() {
                    if let Some(tx) = slot.tx.take() {
                        let _ = tx.send(Ok(body));
                    }
                }
            }
        }
    }
}

fn deliver_echo(shared: &Arc<Shared>, body: String) {
    let slot = shared.queues.lock().unwrap().echoes.pop_front();
    match slot {
        None => log::warn!("console reply with no pending CLI request"),
        Some(state) => {
            let mut slot = state.lock().unwrap();
            if slot.done {
                if let Some(tx) = slot.tx.take() {
                    let _ = tx.send(Ok(body));
                }
            } else {
                slot.body = Some(body);
            }
        }
    }
}

fn command_error(command: String, data: &HashMap<String, Value>) -> GdbError {
    let msg = data
        .get("msg")
        .and_then(|v| v.as_string())
        .unwrap_or("unknown error")
        .to_string();
    let code = data
        .get("code")
        .and_then(|v| v.as_string())
        .and_then(|c| c.parse().ok());
    GdbError::CommandFailed { command, msg, code }
}

/// Fail every pending request and every future call.
fn terminate(shared: &Arc<Shared>) {
    shared.closed.store(true, Ordering::SeqCst);
    let drained = {
        let mut queues = shared.queues.lock().unwrap();
        queues.echoes.clear();
        std::mem::take(&mut queues.requests)
    };
    for pending in drained {
        match pending {
            Pending::Mi { tx, .. } => {
                let _ = tx.send(Err(GdbError::ProcessTerminated));
            }
            Pending::Cli { state, .. } => {
                if let Some(tx) = state.lock().unwrap().tx.take() {
                    let _ = tx.send(Err(GdbError::ProcessTerminated));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    fn split(
        stream: DuplexStream,
    ) -> (
        tokio::io::ReadHalf<DuplexStream>,
        tokio::io::WriteHalf<DuplexStream>,
    ) {
        tokio::io::split(stream)
    }

    /// Communication layer plus the fake-GDB side of the pipes.
    fn wired() -> (
        GdbCommunication,
        tokio::io::WriteHalf<DuplexStream>,
        tokio::io::ReadHalf<DuplexStream>,
    ) {
        let (ours, theirs) = duplex(4096);
        let (our_read, our_write) = split(ours);
        let (their_read, their_write) = split(theirs);
        let comm = GdbCommunication::new(our_read, our_write, false);
        (comm, their_write, their_read)
    }

    async fn read_sent_line(
        reader: &mut tokio::io::ReadHalf<DuplexStream>,
    ) -> String {
        use tokio::io::AsyncReadExt;
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            reader.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            buf.push(byte[0]);
        }
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_mi_requests_pair_fifo() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let first = comm.send_mi("-data-evaluate-expression \"1\"");
        tokio::pin!(first);
        // Poll once so the command is written before the reply goes out.
        tokio::select! {
            biased;
            _ = &mut first => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }

        gdb_out
            .write_all(b"^done,value=\"1\"\n(gdb) \n")
            .await
            .unwrap();
        let data = first.await.unwrap();
        assert_eq!(data.get("value").unwrap().as_string(), Some("1"));

        let second = comm.send_mi("-data-evaluate-expression \"2\"");
        tokio::pin!(second);
        tokio::select! {
            biased;
            _ = &mut second => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }
        gdb_out.write_all(b"^done,value=\"2\"\n").await.unwrap();
        let data = second.await.unwrap();
        assert_eq!(data.get("value").unwrap().as_string(), Some("2"));
    }

    #[tokio::test]
    async fn test_error_result_rejects_with_message_and_command() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let call = comm.send_mi("-break-insert nowhere");
        tokio::pin!(call);
        tokio::select! {
            biased;
            _ = &mut call => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }
        gdb_out
            .write_all(b"^error,msg=\"No symbol table is loaded.\",code=\"1\"\n")
            .await
            .unwrap();

        match call.await {
            Err(GdbError::CommandFailed { command, msg, code }) => {
                assert_eq!(command, "-break-insert nowhere");
                assert_eq!(msg, "No symbol table is loaded.");
                assert_eq!(code, Some(1));
            }
            other => panic!("expected command failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cli_echo_before_result() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let call = comm.send_cli("echo Hello World!");
        tokio::pin!(call);
        let sent = tokio::select! {
            biased;
            _ = &mut call => panic!("resolved without a reply"),
            line = read_sent_line(&mut gdb_in) => line,
        };
        assert_eq!(
            sent,
            "-interpreter-exec console \"concat GDBJS^ echo Hello World!\""
        );

        gdb_out
            .write_all(b"~\"GDBJS^Hello World!\"\n^done\n(gdb) \n")
            .await
            .unwrap();
        assert_eq!(call.await.unwrap(), "Hello World!");
    }

    #[tokio::test]
    async fn test_cli_result_before_echo() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let call = comm.send_cli("echo late");
        tokio::pin!(call);
        tokio::select! {
            biased;
            _ = &mut call => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }

        gdb_out.write_all(b"^done\n").await.unwrap();
        gdb_out.write_all(b"~\"GDBJS^late\"\n").await.unwrap();
        assert_eq!(call.await.unwrap(), "late");
    }

    #[tokio::test]
    async fn test_cli_error_drops_echo_slot() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let failing = comm.send_cli("bogus-command");
        tokio::pin!(failing);
        tokio::select! {
            biased;
            _ = &mut failing => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }
        gdb_out
            .write_all(b"^error,msg=\"Undefined command\"\n")
            .await
            .unwrap();
        assert!(matches!(
            failing.await,
            Err(GdbError::CommandFailed { .. })
        ));

        // The next CLI call still pairs with its own echo.
        let ok = comm.send_cli("echo fine");
        tokio::pin!(ok);
        tokio::select! {
            biased;
            _ = &mut ok => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }
        gdb_out
            .write_all(b"~\"GDBJS^fine\"\n^done\n")
            .await
            .unwrap();
        assert_eq!(ok.await.unwrap(), "fine");
    }

    #[tokio::test]
    async fn test_termination_rejects_pending_and_future_requests() {
        let (comm, mut gdb_out, mut gdb_in) = wired();

        let call = comm.send_mi("-exec-run");
        tokio::pin!(call);
        tokio::select! {
            biased;
            _ = &mut call => panic!("resolved without a reply"),
            _ = read_sent_line(&mut gdb_in) => {}
        }

        gdb_out.shutdown().await.unwrap();
        assert!(matches!(call.await, Err(GdbError::ProcessTerminated)));

        // Reader shutdown marks the layer closed; later calls fail fast.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(matches!(
            comm.send_mi("-exec-run").await,
            Err(GdbError::ProcessTerminated)
        ));
    }

    #[tokio::test]
    async fn test_events_survive_arbitrary_chunking() {
        let (ours, theirs) = duplex(4096);
        let (our_read, our_write) = split(ours);
        let (_their_read, mut their_write) = split(theirs);
        let comm = GdbCommunication::new(our_read, our_write, false);
        let mut events = comm.subscribe();

        let payload = b"*running,thread-id=\"all\"\n~\"hi\"\n=thread-created,id=\"1\",group-id=\"i1\"\n";
        for chunk in payload.chunks(3) {
            their_write.write_all(chunk).await.unwrap();
            their_write.flush().await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(events.recv().await.unwrap());
        }
        assert!(matches!(seen[0], GdbEvent::Exec { .. }));
        assert!(matches!(seen[1], GdbEvent::Running { thread: None }));
        assert!(matches!(&seen[2], GdbEvent::Console(text) if text == "hi"));
        assert!(matches!(seen[3], GdbEvent::Notify { .. }));
        assert!(matches!(&seen[4], GdbEvent::ThreadCreated(t) if t.id == 1));
    }

    #[tokio::test]
    async fn test_console_stream_never_contains_frames() {
        let (ours, theirs) = duplex(4096);
        let (our_read, our_write) = split(ours);
        let (_their_read, mut their_write) = split(theirs);
        let comm = GdbCommunication::new(our_read, our_write, false);
        let mut events = comm.subscribe();

        their_write
            .write_all(
                b"~\"before <gdbjs:event:tick \\\"1\\\" tick:event:gdbjs> after\"\n",
            )
            .await
            .unwrap();

        let mut console = None;
        let mut custom = None;
        for _ in 0..2 {
            match events.recv().await.unwrap() {
                GdbEvent::Console(text) => console = Some(text),
                GdbEvent::Custom { name, payload } => custom = Some((name, payload)),
                other => panic!("unexpected event {:?}", other),
            }
        }
        let console = console.unwrap();
        assert!(!console.contains("<gdbjs:"));
        assert_eq!(console, "before  after");
        let (name, payload) = custom.unwrap();
        assert_eq!(name, "tick");
        assert_eq!(payload, serde_json::Value::String("1".to_string()));
    }

    #[tokio::test]
    async fn test_raw_and_prompt_routing_opt_in() {
        let (ours, theirs) = duplex(4096);
        let (our_read, our_write) = split(ours);
        let (_their_read, mut their_write) = split(theirs);
        let comm = GdbCommunication::new(our_read, our_write, true);
        let mut events = comm.subscribe();

        their_write
            .write_all(b"plain target noise\n(gdb) \n")
            .await
            .unwrap();

        assert!(
            matches!(events.recv().await.unwrap(), GdbEvent::Target(text) if text == "plain target noise")
        );
        assert!(
            matches!(events.recv().await.unwrap(), GdbEvent::Target(text) if text == "(gdb) ")
        );
    }
}
