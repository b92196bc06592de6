//! One-shot sampling from the terminal, for checking a machine without a
//! browser attached.

use std::time::Duration;

use serde_json::Value;

use super::SamplerConfig;

/// Kinds whose report is a delta and needs a baseline request first.
const DELTA_KINDS: &[&str] = &["cpu", "disk", "network"];

pub fn run(kind: &str, interval_ms: u64, pretty: bool, config: &SamplerConfig<'_>) {
    let mut dispatcher = config.dispatcher();
    let request = serde_json::json!({ "type": kind }).to_string();

    if DELTA_KINDS.contains(&kind) {
        if let Err(e) = dispatcher.handle_payload(request.as_bytes()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        log::debug!("baseline taken, waiting {interval_ms} ms");
        std::thread::sleep(Duration::from_millis(interval_ms));
    }

    let response = match dispatcher.handle_payload(request.as_bytes()) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let document: Value = match serde_json::from_slice(&response) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: response is not JSON: {e}");
            std::process::exit(1);
        }
    };
    let text = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    };
    match text {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
