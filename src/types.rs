/// GDB/MI types and data structures
///
/// This module defines the parsed form of GDB/MI protocol output and the
/// domain entities the wrapper hands out (threads, breakpoints, frames).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One parsed line of GDB/MI output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// `^` record, pairs with a pending request.
    Result {
        token: Option<u32>,
        class: ResultClass,
        data: HashMap<String, Value>,
    },
    /// `*` record (execution state changes).
    Exec {
        token: Option<u32>,
        class: String,
        data: HashMap<String, Value>,
    },
    /// `+` record (on-going status, e.g. `+download`).
    Status {
        token: Option<u32>,
        class: String,
        data: HashMap<String, Value>,
    },
    /// `=` record (notifications).
    Notify {
        token: Option<u32>,
        class: String,
        data: HashMap<String, Value>,
    },
    /// `~` record, decoded C-string payload.
    Console(String),
    /// `@` record.
    Target(String),
    /// `&` record.
    Log(String),
    /// The `(gdb) ` prompt on its own line.
    Prompt,
    /// Anything that did not match the grammar. Never an error.
    Raw(String),
}

/// GDB/MI result classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "done" => Some(ResultClass::Done),
            "running" => Some(ResultClass::Running),
            "connected" => Some(ResultClass::Connected),
            "error" => Some(ResultClass::Error),
            "exit" => Some(ResultClass::Exit),
            _ => None,
        }
    }
}

/// Represents values in GDB/MI output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    List(Vec<Value>),
    Tuple(HashMap<String, Value>),
}

impl Value {
    /// Get the value as a string, if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a list, if possible
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Get the value as a tuple, if possible
    pub fn as_tuple(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Tuple(tuple) => Some(tuple),
            _ => None,
        }
    }
}

/// The synthetic key bound to a leading unnamed entry in a tuple or
/// result list. This is the only name the parser ever invents.
pub const UNNAMED_KEY: &str = "unnamed";

/// Materialize a sequence of possibly-unnamed results into a mapping.
///
/// Unnamed entries inherit the previous entry's name; a leading unnamed
/// entry is bound under [`UNNAMED_KEY`]. Duplicate names collapse into an
/// ordered `Value::List`; sole occurrences stay scalar.
pub(crate) fn collect_results(items: Vec<(Option<String>, Value)>) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    let mut collapsed: HashSet<String> = HashSet::new();
    let mut last_name: Option<String> = None;

    for (name, value) in items {
        let key = name
            .or_else(|| last_name.clone())
            .unwrap_or_else(|| UNNAMED_KEY.to_string());
        last_name = Some(key.clone());

        match map.entry(key.clone()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                if collapsed.contains(&key) {
                    if let Value::List(list) = entry.get_mut() {
                        list.push(value);
                    }
                } else {
                    let slot = entry.get_mut();
                    let previous = std::mem::replace(slot, Value::List(Vec::new()));
                    if let Value::List(list) = slot {
                        list.push(previous);
                        list.push(value);
                    }
                    collapsed.insert(key);
                }
            }
        }
    }

    map
}

fn field_str<'a>(tuple: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    tuple.get(key).and_then(|v| v.as_string())
}

fn field_u32(tuple: &HashMap<String, Value>, key: &str) -> Option<u32> {
    field_str(tuple, key).and_then(|s| s.parse().ok())
}

/// A debuggee thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: u32,
    pub status: Option<String>,
    pub group: Option<ThreadGroup>,
    pub frame: Option<Frame>,
}

impl Thread {
    pub fn new(id: u32) -> Self {
        Thread {
            id,
            status: None,
            group: None,
            frame: None,
        }
    }

    /// Build a thread from a `-thread-info` entry.
    pub fn from_tuple(tuple: &HashMap<String, Value>) -> Option<Self> {
        let id = field_u32(tuple, "id")?;
        Some(Thread {
            id,
            status: field_str(tuple, "state").map(|s| s.to_string()),
            group: None,
            frame: tuple
                .get("frame")
                .and_then(|v| v.as_tuple())
                .and_then(Frame::from_tuple),
        })
    }
}

/// An inferior (GDB thread group). MI encodes group identifiers as `i<N>`;
/// only the numeric suffix is kept here and the prefix is reattached when
/// commands are sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadGroup {
    pub id: u32,
    pub executable: Option<String>,
    pub pid: Option<u32>,
}

impl ThreadGroup {
    pub fn new(id: u32) -> Self {
        ThreadGroup {
            id,
            executable: None,
            pid: None,
        }
    }

    /// Parse an `i<N>`-form group identifier.
    pub fn parse_id(raw: &str) -> Option<u32> {
        raw.strip_prefix('i').unwrap_or(raw).parse().ok()
    }

    /// Build a group from a `-list-thread-groups` entry.
    pub fn from_tuple(tuple: &HashMap<String, Value>) -> Option<Self> {
        let id = field_str(tuple, "id").and_then(Self::parse_id)?;
        Some(ThreadGroup {
            id,
            executable: field_str(tuple, "executable").map(|s| s.to_string()),
            pid: field_u32(tuple, "pid"),
        })
    }
}

/// A single stack frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub file: String,
    pub line: u32,
    pub func: Option<String>,
    pub level: Option<u32>,
}

impl Frame {
    /// Build a frame from an MI `frame={...}` tuple. The full path is
    /// preferred over the compilation-relative one.
    pub fn from_tuple(tuple: &HashMap<String, Value>) -> Option<Self> {
        let file = field_str(tuple, "fullname")
            .or_else(|| field_str(tuple, "file"))?
            .to_string();
        let line = field_u32(tuple, "line")?;
        Some(Frame {
            file,
            line,
            func: field_str(tuple, "func").map(|s| s.to_string()),
            level: field_u32(tuple, "level"),
        })
    }
}

/// A breakpoint. `func` holds every function the breakpoint resolved to:
/// empty when GDB reported none, several entries for template or overload
/// expansions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub id: u32,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub func: Vec<String>,
    pub thread: Option<Thread>,
}

impl Breakpoint {
    pub fn new(id: u32) -> Self {
        Breakpoint {
            id,
            file: None,
            line: None,
            func: Vec::new(),
            thread: None,
        }
    }

    pub fn from_tuple(tuple: &HashMap<String, Value>) -> Option<Self> {
        let id = field_u32(tuple, "number")?;
        let mut func = Vec::new();
        if let Some(f) = field_str(tuple, "func") {
            func.push(f.to_string());
        }
        Some(Breakpoint {
            id,
            file: field_str(tuple, "fullname")
                .or_else(|| field_str(tuple, "file"))
                .map(|s| s.to_string()),
            line: field_u32(tuple, "line"),
            func,
            thread: field_u32(tuple, "thread").map(Thread::new),
        })
    }

    /// Build a breakpoint from a `-break-insert` result. For templates and
    /// overloaded functions GDB returns a list whose first element is the
    /// composite breakpoint followed by per-location entries; the location
    /// functions are collected in order.
    pub fn from_insert_result(data: &HashMap<String, Value>) -> Option<Self> {
        match data.get("bkpt")? {
            Value::Tuple(tuple) => Breakpoint::from_tuple(tuple),
            Value::List(items) => {
                let mut entries = items.iter().filter_map(|v| v.as_tuple());
                let mut breakpoint = Breakpoint::from_tuple(entries.next()?)?;
                for location in entries {
                    if let Some(f) = field_str(location, "func") {
                        breakpoint.func.push(f.to_string());
                    }
                    if breakpoint.file.is_none() {
                        breakpoint.file = field_str(location, "fullname")
                            .or_else(|| field_str(location, "file"))
                            .map(|s| s.to_string());
                    }
                    if breakpoint.line.is_none() {
                        breakpoint.line = field_u32(location, "line");
                    }
                }
                Some(breakpoint)
            }
            _ => None,
        }
    }
}

/// A variable visible in some scope, as reported by the debugger-side
/// helpers (values are unparsed display strings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub scope: String,
    pub value: String,
}

/// One entry of the parsed `info variables` listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVar {
    pub file: String,
    pub var_type: String,
    pub name: String,
}
