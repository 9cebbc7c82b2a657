use std::sync::Once;

static TRACING_INIT: Once = Once::new();

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "farmcost=warn",
        1 => "farmcost=info",
        _ => "farmcost=debug",
    }
}

/// Install the global subscriber, writing to stderr. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_directive(0), "farmcost=warn");
        assert_eq!(default_directive(1), "farmcost=info");
        assert_eq!(default_directive(5), "farmcost=debug");
    }
}
