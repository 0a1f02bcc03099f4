//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_PORT;
use feeder_core::ConnError;

/// Stable name of a connection failure, used in JSON output.
pub fn conn_error_name(e: &ConnError) -> &'static str {
    match e {
        ConnError::PortNotFound { .. } => "PortNotFound",
        ConnError::AccessDenied(_) => "AccessDenied",
        ConnError::Io(_) => "Io",
        ConnError::HandshakeError(_) => "HandshakeError",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConnError>() {
        return match ce {
            ConnError::PortNotFound { port, available } => {
                let listed = if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                };
                format!(
                    "What happened: Serial port {port} was not found.\nLikely causes: Board unplugged, wrong port name, or missing USB driver.\nHow to fix: Plug the board in and set [serial] port to one of: {listed}. `feeder ports` lists them."
                )
            }
            ConnError::AccessDenied(msg) => format!(
                "What happened: Access to the serial port was denied ({msg}).\nLikely causes: Another program (serial monitor, IDE) holds the port, or the user lacks permission.\nHow to fix: Close the other program; on Linux add the user to the dialout group."
            ),
            ConnError::Io(msg) => format!(
                "What happened: Serial I/O failed ({msg}).\nLikely causes: Cable pulled or board reset while connected.\nHow to fix: Reconnect the board and run the command again."
            ),
            ConnError::HandshakeError(msg) => format!(
                "What happened: The board handshake failed ({msg}).\nLikely causes: Board reset during PING or a flaky USB cable.\nHow to fix: Wait for the board to boot, then retry; raise serial.settle_ms if it keeps happening."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML ({}).\nLikely causes: Typo or wrong value type.\nHow to fix: Fix the file; every section is optional, so deleting a bad key restores its default.",
            te.message()
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("must be") || lower.contains("unreasonably large") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("not connected") {
        return "What happened: The board is not connected.\nLikely causes: Connection dropped before the command was written.\nHow to fix: Check the cable and run the command again.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map connection failures to stable exit codes; other errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ConnError>() {
        Some(ConnError::PortNotFound { .. }) => 3,
        Some(ConnError::AccessDenied(_)) => 4,
        Some(ConnError::Io(_)) => 5,
        Some(ConnError::HandshakeError(_)) => 6,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ce) = err.downcast_ref::<ConnError>() {
        let msg = humanize(err);
        let port = LAST_PORT.get();
        let obj = match ce {
            ConnError::PortNotFound { port, available } => json!({
                "reason": conn_error_name(ce),
                "details": { "port": port, "available": available },
                "message": msg,
            }),
            _ => match port {
                Some(p) => json!({
                    "reason": conn_error_name(ce),
                    "details": { "port": p },
                    "message": msg,
                }),
                None => json!({ "reason": conn_error_name(ce), "message": msg }),
            },
        };
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
