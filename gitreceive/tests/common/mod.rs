pub mod fixtures;
pub mod logging;

pub use assertions::{assert_contains, assert_mode, assert_path_exists};
pub use fixtures::{GatewayFixture, gateway_binary};
pub use logging::init_test_logging;
