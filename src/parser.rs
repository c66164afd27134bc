/// GDB/MI output parser
///
/// Turns one MI line into a typed [`Record`]. The parser is pure and never
/// fails: anything that does not match the grammar comes back as
/// [`Record::Raw`]. Also hosts the C-string codec and the textual
/// `info variables` parser.

use crate::types::{collect_results, GlobalVar, Record, ResultClass, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn result_record_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+))?\^(done|running|connected|error|exit)(?:,(.*))?$")
            .expect("result record regex")
    })
}

fn async_record_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(\d+))?([*+=])([a-z][a-z-]*)(?:,(.*))?$").expect("async record regex")
    })
}

/// Parse a line of GDB/MI output. The line must already be stripped of its
/// terminator.
pub fn parse_line(line: &str) -> Record {
    if line == "(gdb)" || line == "(gdb) " {
        return Record::Prompt;
    }

    // Stream records carry a single C-string payload.
    if let Some(rest) = line.strip_prefix('~') {
        return match parse_stream_payload(rest) {
            Some(text) => Record::Console(text),
            None => Record::Raw(line.to_string()),
        };
    }
    if let Some(rest) = line.strip_prefix('@') {
        return match parse_stream_payload(rest) {
            Some(text) => Record::Target(text),
            None => Record::Raw(line.to_string()),
        };
    }
    if let Some(rest) = line.strip_prefix('&') {
        return match parse_stream_payload(rest) {
            Some(text) => Record::Log(text),
            None => Record::Raw(line.to_string()),
        };
    }

    if let Some(caps) = result_record_re().captures(line) {
        let token = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let class = caps
            .get(2)
            .and_then(|m| ResultClass::from_str(m.as_str()))
            .unwrap_or(ResultClass::Done);
        let data = match caps.get(3) {
            None => HashMap::new(),
            Some(body) => match parse_body(body.as_str()) {
                Some(data) => data,
                None => return Record::Raw(line.to_string()),
            },
        };
        return Record::Result { token, class, data };
    }

    if let Some(caps) = async_record_re().captures(line) {
        let token = caps.get(1).and_then(|m| m.as_str().parse().ok());
        let class = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
        let data = match caps.get(4) {
            None => HashMap::new(),
            Some(body) => match parse_body(body.as_str()) {
                Some(data) => data,
                None => return Record::Raw(line.to_string()),
            },
        };
        return match caps.get(2).map(|m| m.as_str()) {
            Some("*") => Record::Exec { token, class, data },
            Some("+") => Record::Status { token, class, data },
            _ => Record::Notify { token, class, data },
        };
    }

    Record::Raw(line.to_string())
}

/// Decode the C-string payload of a stream record. Surplus characters
/// after the closing quote are discarded.
fn parse_stream_payload(rest: &str) -> Option<String> {
    let mut chars = rest.chars().peekable();
    parse_cstring(&mut chars)
}

/// Parse a result-record or async-record body into a mapping.
fn parse_body(body: &str) -> Option<HashMap<String, Value>> {
    let mut chars = body.chars().peekable();
    let items = parse_items(&mut chars)?;
    if chars.peek().is_some() {
        return None;
    }
    Some(collect_results(items))
}

/// Parse a comma-separated sequence of results (`name=value` pairs or bare
/// values; MI mixes both).
fn parse_items(chars: &mut Chars) -> Option<Vec<(Option<String>, Value)>> {
    let mut items = Vec::new();
    loop {
        items.push(parse_item(chars)?);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            _ => break,
        }
    }
    Some(items)
}

fn parse_item(chars: &mut Chars) -> Option<(Option<String>, Value)> {
    match chars.peek() {
        Some('"') | Some('{') | Some('[') => Some((None, parse_value(chars)?)),
        _ => {
            let mut name = parse_identifier(chars)?;
            if chars.peek() == Some(&'=') {
                chars.next();
                let value = parse_value(chars)?;
                Some((Some(name), value))
            } else {
                // Not a result after all; treat the rest as an unquoted
                // string value, like the raw addresses GDB sometimes emits.
                while let Some(&ch) = chars.peek() {
                    if ch == ',' || ch == ']' || ch == '}' {
                        break;
                    }
                    name.push(ch);
                    chars.next();
                }
                Some((None, Value::String(name)))
            }
        }
    }
}

fn parse_identifier(chars: &mut Chars) -> Option<String> {
    let mut identifier = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            identifier.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    if identifier.is_empty() {
        return None;
    }
    Some(identifier)
}

fn parse_value(chars: &mut Chars) -> Option<Value> {
    match chars.peek() {
        Some('"') => parse_cstring(chars).map(Value::String),
        Some('{') => {
            chars.next();
            if chars.peek() == Some(&'}') {
                chars.next();
                return Some(Value::Tuple(HashMap::new()));
            }
            let items = parse_items(chars)?;
            if chars.next() != Some('}') {
                return None;
            }
            Some(Value::Tuple(collect_results(items)))
        }
        Some('[') => {
            chars.next();
            if chars.peek() == Some(&']') {
                chars.next();
                return Some(Value::List(Vec::new()));
            }
            let items = parse_items(chars)?;
            if chars.next() != Some(']') {
                return None;
            }
            // A list of named results is materialized as a mapping, the
            // same way a tuple is; a list of plain values stays a list.
            if items.iter().any(|(name, _)| name.is_some()) {
                Some(Value::Tuple(collect_results(items)))
            } else {
                Some(Value::List(items.into_iter().map(|(_, v)| v).collect()))
            }
        }
        _ => {
            let mut text = String::new();
            while let Some(&ch) = chars.peek() {
                if ch == ',' || ch == ']' || ch == '}' {
                    break;
                }
                text.push(ch);
                chars.next();
            }
            if text.is_empty() {
                return None;
            }
            Some(Value::String(text))
        }
    }
}

/// Consume a quoted C-string, decoding the standard escapes. Unknown
/// escapes pass through with their backslash.
fn parse_cstring(chars: &mut Chars) -> Option<String> {
    if chars.next() != Some('"') {
        return None;
    }
    let mut text = String::new();
    loop {
        match chars.next()? {
            '"' => return Some(text),
            '\\' => match chars.next()? {
                'n' => text.push('\n'),
                'r' => text.push('\r'),
                't' => text.push('\t'),
                'b' => text.push('\u{8}'),
                'f' => text.push('\u{c}'),
                '\\' => text.push('\\'),
                '"' => text.push('"'),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            },
            ch => text.push(ch),
        }
    }
}

/// Decode a complete C-string literal (including quotes).
pub fn decode_cstring(input: &str) -> Option<String> {
    let mut chars = input.chars().peekable();
    let text = parse_cstring(&mut chars)?;
    if chars.peek().is_some() {
        return None;
    }
    Some(text)
}

/// Escape text for embedding into a double-quoted MI argument or an
/// injected script. Inverse of the C-string decoding for every byte this
/// vocabulary can produce.
pub fn encode_cstring(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

fn info_variables_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^File (.+):$").expect("file header regex"))
}

fn info_variables_var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*?)([A-Za-z_][A-Za-z0-9_]*)((?:\[[0-9]*\])*);$")
            .expect("variable line regex")
    })
}

/// Parse the textual output of the CLI command `info variables` into a
/// flat ordered list of declarations. Anything after the last file section
/// (non-debugging symbols and the like) is ignored.
pub fn parse_info_variables(output: &str) -> Vec<GlobalVar> {
    let mut variables = Vec::new();
    let mut current_file: Option<String> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if let Some(caps) = info_variables_file_re().captures(line) {
            current_file = caps.get(1).map(|m| m.as_str().to_string());
            continue;
        }
        let file = match &current_file {
            Some(file) => file,
            None => continue,
        };
        if let Some(caps) = info_variables_var_re().captures(line) {
            variables.push(GlobalVar {
                file: file.clone(),
                var_type: caps
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                name: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            });
        }
    }

    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNNAMED_KEY;

    #[test]
    fn test_parse_prompt() {
        assert_eq!(parse_line("(gdb) "), Record::Prompt);
        assert_eq!(parse_line("(gdb)"), Record::Prompt);
    }

    #[test]
    fn test_parse_done_result() {
        match parse_line("^done") {
            Record::Result { token, class, data } => {
                assert_eq!(token, None);
                assert_eq!(class, ResultClass::Done);
                assert!(data.is_empty());
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_result_with_token() {
        match parse_line("123^done,value=\"1\"") {
            Record::Result { token, class, data } => {
                assert_eq!(token, Some(123));
                assert_eq!(class, ResultClass::Done);
                assert_eq!(data.get("value").unwrap().as_string(), Some("1"));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_result() {
        let line = r#"^error,msg="No symbol table is loaded.  Use the \"file\" command.",code="undefined-command""#;
        match parse_line(line) {
            Record::Result { class, data, .. } => {
                assert_eq!(class, ResultClass::Error);
                assert_eq!(
                    data.get("msg").unwrap().as_string(),
                    Some("No symbol table is loaded.  Use the \"file\" command.")
                );
                assert_eq!(data.get("code").unwrap().as_string(), Some("undefined-command"));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_underscore_field_names() {
        let line = r#"^done,name="v1",numchild="0",value="1",type="int",thread-id="1",has_more="0""#;
        match parse_line(line) {
            Record::Result { data, .. } => {
                assert_eq!(data.get("has_more").unwrap().as_string(), Some("0"));
                assert_eq!(data.get("thread-id").unwrap().as_string(), Some("1"));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_exec_stopped() {
        let line = r#"*stopped,reason="breakpoint-hit",bkptno="1",thread-id="1",frame={fullname="/p/hello.c",line="9"}"#;
        match parse_line(line) {
            Record::Exec { class, data, .. } => {
                assert_eq!(class, "stopped");
                let frame = data.get("frame").unwrap().as_tuple().unwrap();
                assert_eq!(frame.get("line").unwrap().as_string(), Some("9"));
            }
            other => panic!("expected exec record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_status_anonymous_tuple() {
        // A status record with an unnamed leading tuple binds it under the
        // synthetic key; this is the only name the parser invents.
        let line = r#"+download,{section=".isr_vector",section-size="776"}"#;
        match parse_line(line) {
            Record::Status { class, data, .. } => {
                assert_eq!(class, "download");
                let unnamed = data.get(UNNAMED_KEY).unwrap().as_tuple().unwrap();
                assert_eq!(unnamed.get("section").unwrap().as_string(), Some(".isr_vector"));
                assert_eq!(unnamed.get("section-size").unwrap().as_string(), Some("776"));
            }
            other => panic!("expected status record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_notify_thread_created() {
        match parse_line(r#"=thread-created,id="1",group-id="i1""#) {
            Record::Notify { class, data, .. } => {
                assert_eq!(class, "thread-created");
                assert_eq!(data.get("group-id").unwrap().as_string(), Some("i1"));
            }
            other => panic!("expected notify record, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_console_stream() {
        assert_eq!(
            parse_line(r#"~"Hello, World!\n""#),
            Record::Console("Hello, World!\n".to_string())
        );
    }

    #[test]
    fn test_parse_target_and_log_streams() {
        assert_eq!(parse_line(r#"@"target output""#), Record::Target("target output".to_string()));
        assert_eq!(parse_line(r#"&"warning\n""#), Record::Log("warning\n".to_string()));
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(
            parse_line(r#"~"a\\b\"c\td\re\bf\fg""#),
            Record::Console("a\\b\"c\td\re\u{8}f\u{c}g".to_string())
        );
    }

    #[test]
    fn test_unknown_escape_passes_through() {
        assert_eq!(parse_line(r#"~"a\qb""#), Record::Console("a\\qb".to_string()));
    }

    #[test]
    fn test_malformed_lines_become_raw() {
        assert_eq!(
            parse_line("not a record"),
            Record::Raw("not a record".to_string())
        );
        assert_eq!(parse_line("^unknown"), Record::Raw("^unknown".to_string()));
        assert_eq!(
            parse_line("^done,=broken"),
            Record::Raw("^done,=broken".to_string())
        );
        assert_eq!(
            parse_line(r#"^done,bkpt={number="1""#),
            Record::Raw(r#"^done,bkpt={number="1""#.to_string())
        );
    }

    #[test]
    fn test_parse_list_of_values() {
        match parse_line(r#"^done,thread-groups=["i1","i2"]"#) {
            Record::Result { data, .. } => {
                let groups = data.get("thread-groups").unwrap().as_list().unwrap();
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].as_string(), Some("i1"));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_list_of_results_collapses_to_mapping() {
        let line = r#"^done,stack=[frame={level="0",fullname="/p/a.c",line="4"},frame={level="1",fullname="/p/b.c",line="7"}]"#;
        match parse_line(line) {
            Record::Result { data, .. } => {
                let stack = data.get("stack").unwrap().as_tuple().unwrap();
                let frames = stack.get("frame").unwrap().as_list().unwrap();
                assert_eq!(frames.len(), 2);
                let first = frames[0].as_tuple().unwrap();
                assert_eq!(first.get("level").unwrap().as_string(), Some("0"));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_breakpoint_modified_multiple_locations() {
        // GDB emits unnamed location tuples after the composite breakpoint;
        // they inherit the `bkpt` name and collapse into an ordered list.
        let line = r#"=breakpoint-modified,bkpt={number="2",addr="<MULTIPLE>"},{number="2.1",func="f<int>"},{number="2.2",func="f<long>"}"#;
        match parse_line(line) {
            Record::Notify { data, .. } => {
                let locations = data.get("bkpt").unwrap().as_list().unwrap();
                assert_eq!(locations.len(), 3);
                let second = locations[1].as_tuple().unwrap();
                assert_eq!(second.get("func").unwrap().as_string(), Some("f<int>"));
            }
            other => panic!("expected notify record, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_tuple_and_list() {
        match parse_line(r#"^done,a={},b=[]"#) {
            Record::Result { data, .. } => {
                assert_eq!(data.get("a"), Some(&Value::Tuple(HashMap::new())));
                assert_eq!(data.get("b"), Some(&Value::List(Vec::new())));
            }
            other => panic!("expected result record, got {:?}", other),
        }
    }

    #[test]
    fn test_cstring_round_trip() {
        let samples = [
            "plain",
            "with \"quotes\" and \\backslashes\\",
            "line\nbreaks\tand\rreturns",
            "unicode: caf\u{e9} \u{1f980}",
            "",
        ];
        for sample in samples {
            let encoded = format!("\"{}\"", encode_cstring(sample));
            assert_eq!(decode_cstring(&encoded).as_deref(), Some(sample));
        }
    }

    #[test]
    fn test_one_record_per_line_regardless_of_content() {
        let lines = [
            r#"^done"#,
            r#"*running,thread-id="all""#,
            r#"~"text""#,
            r#"(gdb) "#,
            r#"garbage line"#,
        ];
        let records: Vec<Record> = lines.iter().map(|l| parse_line(l)).collect();
        assert_eq!(records.len(), lines.len());
    }

    #[test]
    fn test_parse_info_variables() {
        let output = "All defined variables:\n\
                      \n\
                      File /p/hello.c:\n\
                      int counter;\n\
                      static char *message;\n\
                      unsigned long totals[16];\n\
                      \n\
                      File /p/util.c:\n\
                      double ratio;\n\
                      \n\
                      Non-debugging symbols:\n\
                      0x0000000000401000  _init\n";
        let vars = parse_info_variables(output);
        assert_eq!(vars.len(), 4);
        assert_eq!(vars[0].file, "/p/hello.c");
        assert_eq!(vars[0].var_type, "int");
        assert_eq!(vars[0].name, "counter");
        assert_eq!(vars[1].var_type, "static char *");
        assert_eq!(vars[1].name, "message");
        assert_eq!(vars[2].name, "totals");
        assert_eq!(vars[3].file, "/p/util.c");
        assert_eq!(vars[3].name, "ratio");
    }

    #[test]
    fn test_info_variables_ignores_leading_tail() {
        let output = "stray line;\nmore text\n";
        assert!(parse_info_variables(output).is_empty());
    }
}
