//! Native messaging host manifest, the JSON file the browser reads to find
//! and launch the host.

use serde::Serialize;

pub const DEFAULT_HOST_NAME: &str = "com.github.ihiroky.system_monitor";

const DESCRIPTION: &str = "System monitor native messaging host";

#[derive(Serialize)]
struct HostManifest<'a> {
    name: &'a str,
    description: &'a str,
    path: String,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_extensions: Option<Vec<String>>,
}

pub fn run(path: Option<&str>, extension_ids: &[String], name: &str, browser: &str) {
    let path = match path {
        Some(p) => p.to_string(),
        None => match std::env::current_exe() {
            Ok(p) => p.display().to_string(),
            Err(e) => {
                eprintln!("Error: cannot determine host path, pass --path: {e}");
                std::process::exit(1);
            }
        },
    };

    match serde_json::to_string_pretty(&build(&path, extension_ids, name, browser)) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn build<'a>(
    path: &str,
    extension_ids: &[String],
    name: &'a str,
    browser: &str,
) -> HostManifest<'a> {
    let (allowed_origins, allowed_extensions) = if browser == "firefox" {
        (None, Some(extension_ids.to_vec()))
    } else {
        let origins = extension_ids
            .iter()
            .map(|id| chrome_origin(id))
            .collect();
        (Some(origins), None)
    };
    HostManifest {
        name,
        description: DESCRIPTION,
        path: path.to_string(),
        kind: "stdio",
        allowed_origins,
        allowed_extensions,
    }
}

/// `abc` → `chrome-extension://abc/`; full origins pass through.
fn chrome_origin(id: &str) -> String {
    if id.starts_with("chrome-extension://") {
        let trimmed = id.trim_end_matches('/');
        format!("{trimmed}/")
    } else {
        format!("chrome-extension://{id}/")
    }
}
