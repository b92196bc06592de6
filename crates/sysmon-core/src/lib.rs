//! # sysmon-core
//!
//! Sampling and framing engine of the system monitor native messaging host.
//!
//! The browser extension launches the host and talks to it over
//! stdin/stdout. Every message in either direction is one length-prefixed
//! JSON document. A request names a command by its `type`; the response
//! carries the same `type` and a `stat` payload:
//!
//! ```text
//! → {"type":"disk"}
//! ← {"type":"disk","stat":{"time":"2024-05-01T12:00:00Z","disks":[{"name":"sda","rbyte":512,...}]}}
//! ```
//!
//! ## Architecture
//!
//! FrameCodec → CommandRegistry → Command (→ RawSampler → DeltaStore) → FrameCodec
//!
//! - [`FrameCodec`] reads and writes 4-byte little-endian length prefixed
//!   frames.
//! - [`CommandRegistry`] maps a `type` tag to a factory for the matching
//!   [`Command`].
//! - Collectors ([`collectors`]) read absolute kernel counters from a
//!   [`RawSampler`] and turn cumulative ones into per-interval deltas via
//!   the [`DeltaStore`]. The first request for a resource reports its
//!   absolute counters.
//! - [`Dispatcher`] runs the strictly sequential request/response loop.
//!
//! ```no_run
//! use sysmon_core::{CommandRegistry, DeltaStore, Dispatcher, ProcfsSampler};
//!
//! let mut dispatcher = Dispatcher::new(
//!     CommandRegistry::with_builtin(),
//!     ProcfsSampler::new(),
//!     DeltaStore::default(),
//! );
//! let summary = dispatcher
//!     .serve(&mut std::io::stdin().lock(), &mut std::io::stdout().lock())
//!     .expect("session failed");
//! eprintln!("answered {} requests", summary.requests);
//! ```

pub mod collectors;
pub mod command;
pub mod delta;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod procfs;
pub mod sample;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{Command, CommandFactory, CommandRegistry, Echo, ExecContext, Os, platform_name};
pub use delta::{Counters, Delta, DeltaStore, Observation, RegressionPolicy, StoredSample};
pub use dispatch::{Dispatcher, ErrorPolicy, ServeSummary};
pub use error::{Error, Result, SampleError};
pub use frame::{FrameCodec, HEADER_LEN, MAX_FRAME_LEN};
pub use procfs::ProcfsSampler;
pub use sample::{
    CounterBatch, CpuSample, CpuTimes, DiskCounters, MemorySample, NetCounters, RawSampler,
    ResourceKind,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
