//! Tracing setup for the nsapply binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// The default filter runs the crate at `info` (`debug` when `verbose`) and
/// quiets the HTTP client internals, whose connection-level chatter would
/// otherwise drown the per-namespace apply output. `RUST_LOG` overrides the
/// whole filter when set. `json` switches to newline-delimited JSON records
/// for pipeline log collection.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init_tracing(json: bool, verbose: bool) {
    let default_directives = format!(
        "{base},hyper=warn,reqwest=warn,h2=warn",
        base = if verbose { "debug" } else { "info" }
    );
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
