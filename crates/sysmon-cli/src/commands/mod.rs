pub mod manifest;
pub mod probe;
pub mod serve;

use sysmon_core::{CommandRegistry, DeltaStore, Dispatcher, ProcfsSampler, RegressionPolicy};

/// Route all logging to stderr. stdout is the protocol channel and must only
/// ever carry frames.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .init();
}

/// Sampler roots and delta handling, resolved from command-line flags.
pub struct SamplerConfig<'a> {
    pub regression_policy: RegressionPolicy,
    pub proc_root: &'a str,
    pub sys_root: &'a str,
}

impl<'a> SamplerConfig<'a> {
    pub fn from_flags(regression_policy: &str, proc_root: &'a str, sys_root: &'a str) -> Self {
        let regression_policy = regression_policy.parse().unwrap_or_else(|e: String| {
            eprintln!("{e}");
            std::process::exit(2);
        });
        Self {
            regression_policy,
            proc_root,
            sys_root,
        }
    }

    /// Build a dispatcher over the procfs sampler with every builtin command.
    pub fn dispatcher(&self) -> Dispatcher<ProcfsSampler> {
        let sampler = ProcfsSampler::with_roots(self.proc_root, self.sys_root);
        if !sampler.is_available() {
            log::warn!(
                "{} does not look like a procfs mount; sampling requests will fail",
                self.proc_root
            );
        }
        Dispatcher::new(
            CommandRegistry::with_builtin(),
            sampler,
            DeltaStore::new(self.regression_policy),
        )
    }
}
