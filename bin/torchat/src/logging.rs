//! Logging setup.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogArgs;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` if set, or a level from `-v` flags
/// 3. Add any directives from `--log.filter`
pub(crate) fn init_logging(args: &LogArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(args))
        .without_time()
        .try_init()
        .map_err(|err| eyre::eyre!(err))
}

fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom) = &args.filter {
        for directive in custom.split(',') {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("ignoring log directive {directive:?}: {err}"),
            }
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_wins() {
        let args = LogArgs {
            quiet: true,
            verbosity: 2,
            filter: Some("torchat_node=trace".into()),
        };
        assert_eq!(build_filter(&args).to_string(), "error");
    }

    #[test]
    fn test_custom_directives_added() {
        let args = LogArgs {
            quiet: false,
            verbosity: 0,
            filter: Some("torchat_session=trace,torchat_node=debug".into()),
        };
        let filter = build_filter(&args).to_string();
        assert!(filter.contains("torchat_session=trace"));
        assert!(filter.contains("torchat_node=debug"));
    }
}
