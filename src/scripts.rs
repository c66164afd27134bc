/// Debugger-side helper scripts
///
/// Python sources injected into GDB at init time. They register the
/// `concat` echo helper that makes CLI replies attributable, a family of
/// `gdbjs-` commands that print JSON bodies, and the event emitter that
/// frames script events as `<gdbjs:event:...>` markers on the console
/// stream. GDB keeps one Python namespace across invocations, so later
/// scripts can use definitions from earlier ones.

/// Base command class and the event emitter.
pub(crate) const BASE: &str = r#"
import gdb
import sys
import json


class GdbmuxCommand(gdb.Command):
    """Base class for wrapper-defined commands."""

    def __init__(self, name):
        super(GdbmuxCommand, self).__init__("gdbjs-" + name, gdb.COMMAND_USER)

    def invoke(self, arg, from_tty):
        res = self.action(arg, from_tty)
        if res is not None:
            sys.stdout.write(json.dumps(res))
        sys.stdout.flush()


def gdbmux_emit_event(name, payload):
    sys.stdout.write('<gdbjs:event:{0} {1} {0}:event:gdbjs>'.format(
        name, json.dumps(payload)))
    sys.stdout.flush()
"#;

/// The `concat` helper: executes a CLI command and prints its captured
/// output behind the caller-supplied prefix.
pub(crate) const CONCAT: &str = r#"
class ConcatCommand(gdb.Command):
    """Executes a command and prints its output behind a prefix."""

    def __init__(self):
        super(ConcatCommand, self).__init__("concat", gdb.COMMAND_USER)

    def invoke(self, arg, from_tty):
        pair = arg.partition(' ')
        sys.stdout.write(pair[0] + gdb.execute(pair[2], False, True))
        sys.stdout.flush()

ConcatCommand()
"#;

/// Meta-command that forwards arbitrary CLI text. Output is written back
/// to stdout so events raised during execution stay visible.
pub(crate) const EXEC: &str = r#"
class ExecCommand(GdbmuxCommand):
    """Executes a CLI command and prints its output."""

    def __init__(self):
        super(ExecCommand, self).__init__("exec")

    def action(self, arg, from_tty):
        sys.stdout.write(gdb.execute(arg, False, True))

ExecCommand()
"#;

/// Lists every symbol visible from the selected frame.
pub(crate) const CONTEXT: &str = r#"
class ContextCommand(GdbmuxCommand):
    """Lists all symbols visible in the current context."""

    def __init__(self):
        super(ContextCommand, self).__init__("context")

    def action(self, arg, from_tty):
        frame = gdb.selected_frame()
        block = frame.block()
        seen = set()
        symbols = []
        while block:
            for symbol in block:
                name = symbol.name
                if name in seen:
                    continue
                if not (symbol.is_argument or symbol.is_variable or
                        symbol.is_function or symbol.is_constant):
                    continue
                seen.add(name)
                if block.is_global:
                    scope = "global"
                elif block.is_static:
                    scope = "static"
                elif symbol.is_argument:
                    scope = "argument"
                else:
                    scope = "local"
                symbols.append({
                    "name": name,
                    "value": str(symbol.value(frame)),
                    "type": str(symbol.type),
                    "scope": scope,
                })
            block = block.superblock
        return symbols

ContextCommand()
"#;

/// Lists source files matching a regex.
pub(crate) const SOURCES: &str = r#"
import re


class SourcesCommand(GdbmuxCommand):
    """Lists source files of the selected inferior matching a regex."""

    def __init__(self):
        super(SourcesCommand, self).__init__("sources")

    def action(self, arg, from_tty):
        info = gdb.execute("info sources", False, True)
        info = re.sub(r"Reading symbols .*?\.{3}done\.", "", info)
        files = re.findall(r"([/\\].*?)[,\n]", info)
        return [f for f in files if re.search(arg, f)]

SourcesCommand()
"#;

/// Reports the selected thread and its group.
pub(crate) const THREAD: &str = r#"
class ThreadCommand(GdbmuxCommand):
    """Reports the selected thread."""

    def __init__(self):
        super(ThreadCommand, self).__init__("thread")

    def action(self, arg, from_tty):
        thread = gdb.selected_thread()
        num = None
        if thread is not None:
            num = getattr(thread, "global_num", None) or thread.num
        inferior = gdb.selected_inferior()
        return {"id": num, "group": {"id": inferior.num, "pid": inferior.pid}}

ThreadCommand()
"#;

/// Reports the selected thread group.
pub(crate) const GROUP: &str = r#"
class GroupCommand(GdbmuxCommand):
    """Reports the selected thread group."""

    def __init__(self):
        super(GroupCommand, self).__init__("group")

    def action(self, arg, from_tty):
        inferior = gdb.selected_inferior()
        return {"id": inferior.num, "pid": inferior.pid}

GroupCommand()
"#;

/// Emits a `new-objfile` event whenever the debuggee maps an object file.
pub(crate) const OBJFILE: &str = r#"
def gdbmux_new_objfile(event):
    gdbmux_emit_event("new-objfile", event.new_objfile.filename)

gdb.events.new_objfile.connect(gdbmux_new_objfile)
"#;

/// All helper scripts, in injection order: the base definitions must come
/// first, the rest build on them.
pub(crate) const HELPERS: &[&str] = &[
    BASE, CONCAT, EXEC, CONTEXT, SOURCES, THREAD, GROUP, OBJFILE,
];
