use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over the
/// verbosity flag.
pub fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,consul_io=debug,consul_io_core=debug"
    } else {
        "warn,consul_io=info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_parse() {
        for verbose in [false, true] {
            assert!(default_filter(verbose).parse::<EnvFilter>().is_ok());
        }
    }
}
