//! Lua sandbox creation
//!
//! Pipelines run in a restricted Lua state: no filesystem, network, process
//! or module loading. The only way a script talks to the host is through the
//! bindings the runtime injects (`input`, `args`, `complete`, `log`).

use mlua::{Function, HookTriggers, Lua, LuaOptions, Result as LuaResult, StdLib, Table, VmState};
use tokio_util::sync::CancellationToken;

/// How many VM instructions run between two cancellation checks
pub const CANCELLATION_CHECK_INTERVAL: u32 = 1_000;

/// Message carried by the error a cancelled script unwinds with
pub const CANCELLED_MESSAGE: &str = "script cancelled";

/// Create a restricted Lua sandbox
///
/// Only the TABLE, STRING, MATH and COROUTINE libraries are opened on top of
/// the base library. Globals that load code from outside the sandbox, or that
/// write straight to the process stdout, are removed.
///
/// # Security
/// This sandbox prevents:
/// - Network access
/// - File system access (`io`, `dofile`, `loadfile`)
/// - Process execution (`os`)
/// - Loading code via `require()` or `load()`
///
/// # Example
/// ```no_run
/// use fusion_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox()?;
/// let n: i64 = lua.load("return 1 + 2").eval()?;
/// assert_eq!(n, 3);
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE,
        LuaOptions::default(),
    )?;

    let globals = lua.globals();
    for name in ["require", "dofile", "loadfile", "load", "print"] {
        globals.set(name, mlua::Nil)?;
    }

    Ok(lua)
}

/// Re-raises errors that `pcall`, `xpcall` and `coroutine.resume` would
/// otherwise swallow once the run is cancelled. Receives the cancellation
/// check and the message as varargs.
const CANCELLATION_GUARDS: &str = r#"
local cancelled, message = ...
local raw_pcall, raw_xpcall, raw_resume = pcall, xpcall, coroutine.resume
local create = coroutine.create

local function guard(ok, ...)
    if not ok and cancelled() then
        error(message, 0)
    end
    return ok, ...
end

local function unwrap(ok, ...)
    if not ok then
        error((...), 0)
    end
    return ...
end

pcall = function(f, ...)
    return guard(raw_pcall(f, ...))
end

xpcall = function(f, handler, ...)
    return guard(raw_xpcall(f, handler, ...))
end

coroutine.resume = function(co, ...)
    return guard(raw_resume(co, ...))
end

coroutine.wrap = function(f)
    local co = create(f)
    return function(...)
        return unwrap(guard(raw_resume(co, ...)))
    end
end
"#;

/// Make the sandbox abort once `cancel` fires
///
/// The check runs every [`CANCELLATION_CHECK_INTERVAL`] instructions on the
/// main thread and on every coroutine the script creates, so a busy loop
/// unwinds shortly after cancellation with a runtime error whose message is
/// [`CANCELLED_MESSAGE`]. Protected calls cannot catch that error.
pub fn install_cancellation_hook(lua: &Lua, cancel: CancellationToken) -> LuaResult<()> {
    let coroutine: Table = lua.globals().get("coroutine")?;
    let thread_cancel = cancel.clone();
    let create = lua.create_function(move |lua, f: Function| {
        let thread = lua.create_thread(f)?;
        let cancel = thread_cancel.clone();
        thread.set_hook(cancellation_triggers(), move |_lua, _debug| {
            check_cancelled(&cancel)
        })?;
        Ok(thread)
    })?;
    coroutine.set("create", create)?;

    let check_cancel = cancel.clone();
    let is_cancelled = lua.create_function(move |_, ()| Ok(check_cancel.is_cancelled()))?;
    lua.load(CANCELLATION_GUARDS)
        .set_name("cancellation")
        .call::<()>((is_cancelled, CANCELLED_MESSAGE))?;

    lua.set_hook(cancellation_triggers(), move |_lua, _debug| {
        check_cancelled(&cancel)
    })
}

fn cancellation_triggers() -> HookTriggers {
    HookTriggers::new().every_nth_instruction(CANCELLATION_CHECK_INTERVAL)
}

fn check_cancelled(cancel: &CancellationToken) -> LuaResult<VmState> {
    if cancel.is_cancelled() {
        Err(mlua::Error::RuntimeError(CANCELLED_MESSAGE.to_string()))
    } else {
        Ok(VmState::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_basic_lua() {
        let lua = create_sandbox().unwrap();

        let result: i32 = lua
            .load(
                r#"
                local t = {a = 1, b = 2}
                return t.a + t.b
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(result, 3);

        let result: String = lua.load(r#"return string.upper("hello")"#).eval().unwrap();
        assert_eq!(result, "HELLO");

        let result: f64 = lua.load(r#"return math.sqrt(16)"#).eval().unwrap();
        assert_eq!(result, 4.0);
    }

    #[test]
    fn test_sandbox_no_io() {
        let lua = create_sandbox().unwrap();

        let has_io: bool = lua.load(r#"return io ~= nil"#).eval().unwrap();
        assert!(!has_io);

        let has_os: bool = lua.load(r#"return os ~= nil"#).eval().unwrap();
        assert!(!has_os);

        let has_print: bool = lua.load(r#"return print ~= nil"#).eval().unwrap();
        assert!(!has_print);
    }

    #[test]
    fn test_sandbox_no_code_loading() {
        let lua = create_sandbox().unwrap();

        assert!(lua.load(r#"require("os")"#).exec().is_err());
        assert!(lua.load(r#"load("return 1")()"#).exec().is_err());
        assert!(lua.load(r#"dofile("/etc/passwd")"#).exec().is_err());
    }

    #[test]
    fn test_cancelled_hook_stops_busy_loop() {
        let lua = create_sandbox().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        install_cancellation_hook(&lua, cancel).unwrap();

        let err = lua.load("while true do end").exec().unwrap_err();
        assert!(err.to_string().contains(CANCELLED_MESSAGE));
    }

    #[test]
    fn test_uncancelled_hook_lets_script_finish() {
        let lua = create_sandbox().unwrap();
        install_cancellation_hook(&lua, CancellationToken::new()).unwrap();

        let sum: i64 = lua
            .load("local s = 0 for i = 1, 10000 do s = s + i end return s")
            .eval()
            .unwrap();
        assert_eq!(sum, 50_005_000);
    }

    fn cancelled_sandbox() -> Lua {
        let lua = create_sandbox().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        install_cancellation_hook(&lua, cancel).unwrap();
        lua
    }

    #[test]
    fn test_cancelled_hook_reaches_coroutines() {
        let lua = cancelled_sandbox();

        let err = lua
            .load("coroutine.wrap(function() while true do end end)()")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains(CANCELLED_MESSAGE));

        let err = lua
            .load(
                r#"
                local co = coroutine.create(function() while true do end end)
                while true do coroutine.resume(co) end
            "#,
            )
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains(CANCELLED_MESSAGE));
    }

    #[test]
    fn test_protected_calls_cannot_swallow_cancellation() {
        let lua = cancelled_sandbox();

        let err = lua
            .load("while true do pcall(function() while true do end end) end")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains(CANCELLED_MESSAGE));

        let err = lua
            .load("while true do xpcall(function() while true do end end, tostring) end")
            .exec()
            .unwrap_err();
        assert!(err.to_string().contains(CANCELLED_MESSAGE));
    }

    #[test]
    fn test_guards_keep_normal_semantics() {
        let lua = create_sandbox().unwrap();
        install_cancellation_hook(&lua, CancellationToken::new()).unwrap();

        let (ok, message): (bool, String) = lua
            .load(r#"return pcall(error, "boom", 0)"#)
            .eval()
            .unwrap();
        assert!(!ok);
        assert_eq!(message, "boom");

        let handled: String = lua
            .load(r#"local _, m = xpcall(error, function(e) return "handled " .. e end, "x", 0) return m"#)
            .eval()
            .unwrap();
        assert_eq!(handled, "handled x");

        let sum: i64 = lua
            .load(
                r#"
                local gen = coroutine.wrap(function()
                    for i = 1, 3 do coroutine.yield(i) end
                end)
                return gen() + gen() + gen()
            "#,
            )
            .eval()
            .unwrap();
        assert_eq!(sum, 6);

        let (ok, value): (bool, i64) = lua
            .load(
                r#"
                local co = coroutine.create(function(a) return a * 2 end)
                return coroutine.resume(co, 21)
            "#,
            )
            .eval()
            .unwrap();
        assert!(ok);
        assert_eq!(value, 42);
    }
}
