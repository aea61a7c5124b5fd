/// The crate version, reported at startup.
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");
