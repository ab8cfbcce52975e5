//! Wire protocol between the worker and a sandbox session.
//!
//! The execution channel is an unstructured text stream shared with
//! arbitrary user `print` output, so the wrapper script frames the return
//! value (stdout) and the exception message (stderr) in sentinel pairs.
//! Known limitation: user output containing a literal sentinel token can
//! corrupt extraction. The tokens are kept fixed for wire compatibility
//! with existing wrapper payloads.

use std::collections::HashMap;

use flare_common::ExecError;

pub const RESULT_MARKER: &str = "__FLARE_RESULT__";
pub const ERROR_MARKER: &str = "__FLARE_ERROR__";

/// Argument shape handed to the wrapper: either the single-execution
/// args/kwargs pair, or one opaque batch item payload.
#[derive(Debug, Clone, Copy)]
pub enum CallArgs<'a> {
    ArgsKwargs { args: &'a str, kwargs: &'a str },
    Item(&'a str),
}

/// Build the executable wrapper around verbatim user code.
///
/// The script decodes the hex payloads, invokes the target function, and
/// emits either the hex-encoded serialized return value between
/// `RESULT_MARKER` pairs on stdout, or the exception message between
/// `ERROR_MARKER` pairs on stderr followed by the full stack trace (the
/// trace is diagnostic only and never parsed).
pub fn build_script(
    code: &str,
    function_name: &str,
    call: CallArgs<'_>,
    env: Option<&HashMap<String, String>>,
) -> String {
    let mut script = String::new();
    script.push_str("import sys\nimport traceback\n\nimport cloudpickle\n\n");

    if let Some(env) = env.filter(|e| !e.is_empty()) {
        script.push_str("import os\n");
        let mut keys: Vec<&String> = env.keys().collect();
        keys.sort();
        for key in keys {
            script.push_str(&format!(
                "os.environ[{}] = {}\n",
                py_str(key),
                py_str(&env[key.as_str()])
            ));
        }
        script.push('\n');
    }

    script.push_str(code);
    if !code.ends_with('\n') {
        script.push('\n');
    }
    script.push('\n');

    match call {
        CallArgs::ArgsKwargs { args, kwargs } => {
            script.push_str("def __flare_main__():\n");
            push_payload_load(&mut script, "__flare_args", args, "()");
            push_payload_load(&mut script, "__flare_kwargs", kwargs, "{}");
            script.push_str(&format!(
                "    __flare_ret = {function_name}(*__flare_args, **__flare_kwargs)\n"
            ));
        }
        CallArgs::Item(item) => {
            script.push_str("def __flare_main__():\n");
            push_payload_load(&mut script, "__flare_item", item, "None");
            script.push_str(&format!(
                "    __flare_ret = {function_name}(__flare_item)\n"
            ));
        }
    }
    script.push_str("    __flare_payload = cloudpickle.dumps(__flare_ret).hex()\n");
    script.push_str(&format!(
        "    print(\"{RESULT_MARKER}\" + __flare_payload + \"{RESULT_MARKER}\")\n"
    ));
    script.push_str("\ntry:\n    __flare_main__()\nexcept Exception as __flare_exc:\n");
    script.push_str(&format!(
        "    print(\"{ERROR_MARKER}\" + str(__flare_exc) + \"{ERROR_MARKER}\", file=sys.stderr)\n"
    ));
    script.push_str("    traceback.print_exc()\n");

    script
}

fn push_payload_load(script: &mut String, var: &str, hex_payload: &str, empty: &str) {
    if hex_payload.is_empty() {
        script.push_str(&format!("    {var} = {empty}\n"));
    } else {
        script.push_str(&format!(
            "    {var} = cloudpickle.loads(bytes.fromhex(\"{hex_payload}\"))\n"
        ));
    }
}

/// Quote a string as a Python literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parse captured session output back into the hex result payload.
///
/// Precedence: a runtime-level error wins over everything, then the stderr
/// error sentinel, then the stdout result sentinel; a missing result marker
/// is a protocol extraction failure.
pub fn decode_output(
    stdout: &str,
    stderr: &str,
    runtime_error: Option<&str>,
) -> Result<String, ExecError> {
    if let Some(err) = runtime_error {
        return Err(ExecError::Session(err.to_string()));
    }

    if let Some(message) = extract_between(stderr, ERROR_MARKER) {
        return Err(ExecError::UserCode(message.to_string()));
    }

    match extract_between(stdout, RESULT_MARKER) {
        Some(payload) => Ok(payload.to_string()),
        None => Err(ExecError::ProtocolExtraction),
    }
}

/// First non-greedy match between a sentinel pair, or None.
fn extract_between<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    let end = text[start..].find(marker)?;
    Some(&text[start..start + end])
}
