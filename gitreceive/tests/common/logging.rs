use tracing_subscriber::{EnvFilter, fmt};

/// Route test-side tracing through the libtest capture. Gateway processes
/// log on their own stderr.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_env("GITRECEIVE_TEST_LOG")
        .unwrap_or_else(|_| EnvFilter::new("test=info"));
    let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
}

#[macro_export]
macro_rules! test_log {
    ($($arg:tt)*) => {
        tracing::info!(target: "test", $($arg)*);
    };
}
