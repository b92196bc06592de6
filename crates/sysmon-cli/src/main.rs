//! sysmon-host — native messaging host for the system monitor browser extension.
//!
//! Launched by the browser with stdin/stdout connected to the extension.
//! Logs go to stderr; stdout carries only protocol frames.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sysmon-host")]
#[command(about = "sysmon-host — CPU, memory, disk and network telemetry for the system monitor extension")]
#[command(version = sysmon_core::VERSION)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace).
    /// RUST_LOG takes precedence when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for `serve`, which runs when no subcommand is given
    /// (this is how the browser launches the host).
    #[command(flatten)]
    serve: ServeArgs,
}

/// Sampler and delta settings shared by `serve` and `probe`.
#[derive(Args, Clone)]
struct SamplerArgs {
    /// How to report a counter that went backwards: wrap, clamp, rebaseline
    #[arg(long, default_value = "wrap", value_parser = ["wrap", "clamp", "rebaseline"])]
    regression_policy: String,

    /// Root of the procfs mount
    #[arg(long, default_value = "/proc")]
    proc_root: String,

    /// Root of the sysfs mount
    #[arg(long, default_value = "/sys")]
    sys_root: String,
}

#[derive(Args, Clone)]
struct ServeArgs {
    #[command(flatten)]
    sampler: SamplerArgs,

    /// What to do when a request fails: exit (close the channel) or respond
    /// (send an error frame and keep serving)
    #[arg(long = "on-error", default_value = "exit", value_parser = ["exit", "respond"])]
    on_error: String,

    /// Largest accepted request payload in bytes
    #[arg(long, default_value_t = sysmon_core::MAX_FRAME_LEN)]
    max_frame: usize,

    /// Arguments the browser passes at launch: Chrome sends the caller
    /// origin (and `--parent-window` on Windows), Firefox sends the
    /// manifest path and the add-on ID. Logged, otherwise unused.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    launch_args: Vec<String>,

    /// Parent window handle passed by Chrome on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve framed requests on stdin/stdout until the browser disconnects
    Serve(ServeArgs),

    /// Sample one resource twice and print the per-interval result as JSON
    Probe {
        /// Resource to sample
        #[arg(value_parser = ["cpu", "memory", "disk", "network", "os"])]
        kind: String,

        /// Delay between the baseline and the reported sample, in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        sampler: SamplerArgs,
    },

    /// Print the native messaging host manifest for installation
    Manifest {
        /// Absolute path of the host binary (default: this executable)
        #[arg(long)]
        path: Option<String>,

        /// Extension ID allowed to connect (repeatable)
        #[arg(long = "extension-id", required = true)]
        extension_ids: Vec<String>,

        /// Host name registered with the browser
        #[arg(long, default_value = commands::manifest::DEFAULT_HOST_NAME)]
        name: String,

        /// Browser manifest flavour
        #[arg(long, default_value = "chrome", value_parser = ["chrome", "firefox"])]
        browser: String,
    },
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    match cli.command {
        None => commands::serve::run(serve_config(&cli.serve)),
        Some(Commands::Serve(args)) => commands::serve::run(serve_config(&args)),
        Some(Commands::Probe {
            kind,
            interval_ms,
            pretty,
            sampler,
        }) => commands::probe::run(
            &kind,
            interval_ms,
            pretty,
            &commands::SamplerConfig::from_flags(
                &sampler.regression_policy,
                &sampler.proc_root,
                &sampler.sys_root,
            ),
        ),
        Some(Commands::Manifest {
            path,
            extension_ids,
            name,
            browser,
        }) => commands::manifest::run(path.as_deref(), &extension_ids, &name, &browser),
    }
}

fn serve_config(args: &ServeArgs) -> commands::serve::ServeConfig<'_> {
    commands::serve::ServeConfig {
        sampler: commands::SamplerConfig::from_flags(
            &args.sampler.regression_policy,
            &args.sampler.proc_root,
            &args.sampler.sys_root,
        ),
        on_error: &args.on_error,
        max_frame: args.max_frame,
        launch_args: &args.launch_args,
        parent_window: args.parent_window.as_deref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        assert!(cli.command.is_none(), "launch must fall through to serve");
        cli.serve
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_launch_serves() {
        let args = serve_args(&["sysmon-host"]);
        assert!(args.launch_args.is_empty());
        assert_eq!(args.on_error, "exit");
    }

    #[test]
    fn chrome_launch_shape() {
        let args = serve_args(&["sysmon-host", "chrome-extension://abcdef/"]);
        assert_eq!(args.launch_args, vec!["chrome-extension://abcdef/"]);

        let args = serve_args(&["sysmon-host", "chrome-extension://abcdef/", "--parent-window=0"]);
        assert_eq!(
            args.launch_args,
            vec!["chrome-extension://abcdef/", "--parent-window=0"]
        );
    }

    #[test]
    fn firefox_launch_shape() {
        let args = serve_args(&[
            "sysmon-host",
            "/home/u/.mozilla/native-messaging-hosts/com.github.ihiroky.system_monitor.json",
            "sysmon@example.org",
        ]);
        assert_eq!(
            args.launch_args,
            vec![
                "/home/u/.mozilla/native-messaging-hosts/com.github.ihiroky.system_monitor.json",
                "sysmon@example.org",
            ]
        );
    }

    #[test]
    fn flags_before_launch_args_still_apply() {
        let args = serve_args(&["sysmon-host", "--on-error", "respond", "chrome-extension://x/"]);
        assert_eq!(args.on_error, "respond");
        assert_eq!(args.launch_args, vec!["chrome-extension://x/"]);
    }

    #[test]
    fn subcommands_still_parse() {
        let cli = Cli::try_parse_from(["sysmon-host", "probe", "disk", "--interval-ms", "10"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Probe { ref kind, interval_ms: 10, .. }) if kind == "disk"
        ));
        let cli = Cli::try_parse_from(["sysmon-host", "manifest", "--extension-id", "abc"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Manifest { .. })));
    }
}
