//! Single entry point for logging setup. Library code never installs a
//! subscriber itself; only the two demonstration binaries call this, once,
//! at startup.

use tracing_subscriber::EnvFilter;

/// Install a `tracing-subscriber` `fmt` layer driven by `RUST_LOG` (falling
/// back to `info` for this crate if unset).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatbench=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
