//! The native messaging session: frames on stdin, frames on stdout.

use sysmon_core::{ErrorPolicy, FrameCodec};

use super::SamplerConfig;

pub struct ServeConfig<'a> {
    pub sampler: SamplerConfig<'a>,
    pub on_error: &'a str,
    pub max_frame: usize,
    pub launch_args: &'a [String],
    pub parent_window: Option<&'a str>,
}

pub fn run(config: ServeConfig<'_>) {
    let error_policy: ErrorPolicy = config.on_error.parse().unwrap_or_else(|e: String| {
        eprintln!("{e}");
        std::process::exit(2);
    });

    if config.launch_args.is_empty() {
        log::debug!("no launch arguments given");
    }
    for (i, arg) in config.launch_args.iter().enumerate() {
        log::info!("launch argument {i}: {arg}");
    }
    if let Some(handle) = config.parent_window {
        log::debug!("parent window {handle}");
    }

    let mut dispatcher = config
        .sampler
        .dispatcher()
        .with_codec(FrameCodec::with_max_len(config.max_frame))
        .with_error_policy(error_policy);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    match dispatcher.serve(&mut stdin.lock(), &mut stdout.lock()) {
        Ok(summary) => {
            log::info!(
                "session ended: {} requests, {} error responses",
                summary.requests,
                summary.error_responses
            );
        }
        Err(e) => {
            log::error!("session aborted: {e}");
            std::process::exit(1);
        }
    }
}
