/// Wrapper event model
///
/// Defines the events delivered on the wrapper's broadcast bus and the
/// synthesis of high-level events out of raw MI async records, plus the
/// scanner for `<gdbjs:event:...>` frames that debugger-side scripts embed
/// into the console stream.

use crate::types::{Breakpoint, Frame, Thread, ThreadGroup, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Events emitted by the wrapper. Delivered on a broadcast channel so any
/// number of observers can read every event without consuming it.
#[derive(Debug, Clone)]
pub enum GdbEvent {
    /// Raw exec record (`*`), with its MI class and payload.
    Exec {
        state: String,
        data: HashMap<String, Value>,
    },
    /// Raw status record (`+`).
    Status {
        state: String,
        data: HashMap<String, Value>,
    },
    /// Raw notify record (`=`).
    Notify {
        state: String,
        data: HashMap<String, Value>,
    },
    /// Console stream output, with embedded frames stripped.
    Console(String),
    /// Target stream output.
    Target(String),
    /// Log stream output.
    Log(String),
    /// The target stopped.
    Stopped {
        reason: Option<String>,
        thread: Option<Thread>,
        breakpoint: Option<Breakpoint>,
    },
    /// The target resumed. `thread` is absent when all threads resumed.
    Running { thread: Option<Thread> },
    ThreadCreated(Thread),
    ThreadExited(Thread),
    ThreadGroupStarted(ThreadGroup),
    ThreadGroupExited(ThreadGroup),
    /// A new object file was loaded into the debuggee.
    NewObjfile(String),
    /// An event pushed by a user-defined debugger-side script.
    Custom {
        name: String,
        payload: serde_json::Value,
    },
}

/// Synthesize wrapper events for one async record. The raw record is
/// always re-emitted; recognized classes additionally produce a typed
/// high-level event.
pub(crate) fn synthesize(record: &crate::types::Record) -> Vec<GdbEvent> {
    use crate::types::Record;

    let mut events = Vec::new();
    match record {
        Record::Exec { class, data, .. } => {
            events.push(GdbEvent::Exec {
                state: class.clone(),
                data: data.clone(),
            });
            match class.as_str() {
                "stopped" => events.push(stopped_event(data)),
                "running" => events.push(running_event(data)),
                _ => {}
            }
        }
        Record::Status { class, data, .. } => {
            events.push(GdbEvent::Status {
                state: class.clone(),
                data: data.clone(),
            });
        }
        Record::Notify { class, data, .. } => {
            events.push(GdbEvent::Notify {
                state: class.clone(),
                data: data.clone(),
            });
            match class.as_str() {
                "thread-created" => {
                    if let Some(thread) = notify_thread(data) {
                        events.push(GdbEvent::ThreadCreated(thread));
                    }
                }
                "thread-exited" => {
                    if let Some(thread) = notify_thread(data) {
                        events.push(GdbEvent::ThreadExited(thread));
                    }
                }
                "thread-group-started" => {
                    if let Some(group) = notify_group(data) {
                        events.push(GdbEvent::ThreadGroupStarted(group));
                    }
                }
                "thread-group-exited" => {
                    if let Some(group) = notify_group(data) {
                        events.push(GdbEvent::ThreadGroupExited(group));
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
    events
}

fn stopped_event(data: &HashMap<String, Value>) -> GdbEvent {
    let reason = data
        .get("reason")
        .and_then(|v| v.as_string())
        .map(|s| s.to_string());

    // `thread-id="all"` means no single thread stopped.
    let thread = data
        .get("thread-id")
        .and_then(|v| v.as_string())
        .filter(|id| *id != "all")
        .and_then(|id| id.parse().ok())
        .map(|id| Thread {
            id,
            status: Some("stopped".to_string()),
            group: None,
            frame: data
                .get("frame")
                .and_then(|v| v.as_tuple())
                .and_then(Frame::from_tuple),
        });

    let breakpoint = if reason.as_deref() == Some("breakpoint-hit") {
        data.get("bkptno")
            .and_then(|v| v.as_string())
            .and_then(|id| id.parse().ok())
            .map(Breakpoint::new)
    } else {
        None
    };

    GdbEvent::Stopped {
        reason,
        thread,
        breakpoint,
    }
}

fn running_event(data: &HashMap<String, Value>) -> GdbEvent {
    let thread = data
        .get("thread-id")
        .and_then(|v| v.as_string())
        .filter(|id| *id != "all")
        .and_then(|id| id.parse().ok())
        .map(|id| Thread {
            id,
            status: Some("running".to_string()),
            group: None,
            frame: None,
        });
    GdbEvent::Running { thread }
}

fn notify_thread(data: &HashMap<String, Value>) -> Option<Thread> {
    let id = data.get("id").and_then(|v| v.as_string())?.parse().ok()?;
    let group = data
        .get("group-id")
        .and_then(|v| v.as_string())
        .and_then(ThreadGroup::parse_id)
        .map(ThreadGroup::new);
    Some(Thread {
        id,
        status: None,
        group,
        frame: None,
    })
}

fn notify_group(data: &HashMap<String, Value>) -> Option<ThreadGroup> {
    let id = data
        .get("id")
        .and_then(|v| v.as_string())
        .and_then(ThreadGroup::parse_id)?;
    Some(ThreadGroup {
        id,
        executable: None,
        pid: data
            .get("pid")
            .and_then(|v| v.as_string())
            .and_then(|p| p.parse().ok()),
    })
}

fn event_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<gdbjs:event:([A-Za-z0-9_-]+) (.*?) ([A-Za-z0-9_-]+):event:gdbjs>")
            .expect("event frame regex")
    })
}

fn frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<gdbjs:.*?:gdbjs>").expect("frame regex"))
}

/// Scan console text for embedded event frames and decode their JSON
/// payloads. A malformed frame is logged and skipped, never an error.
pub(crate) fn extract_events(text: &str) -> Vec<(String, serde_json::Value)> {
    let mut events = Vec::new();
    for caps in event_frame_re().captures_iter(text) {
        let name = &caps[1];
        if name != &caps[3] {
            log::warn!("mismatched event frame markers: {} vs {}", name, &caps[3]);
            continue;
        }
        match serde_json::from_str(&caps[2]) {
            Ok(payload) => events.push((name.to_string(), payload)),
            Err(err) => log::warn!("undecodable payload for event {}: {}", name, err),
        }
    }
    events
}

/// Remove every `<gdbjs:...:gdbjs>` frame from console text.
pub(crate) fn strip_frames(text: &str) -> String {
    frame_re().replace_all(text, "").into_owned()
}

/// Map a decoded script event to a wrapper event.
pub(crate) fn script_event(name: String, payload: serde_json::Value) -> GdbEvent {
    if name == "new-objfile" {
        if let serde_json::Value::String(path) = &payload {
            return GdbEvent::NewObjfile(path.clone());
        }
    }
    GdbEvent::Custom { name, payload }
}
