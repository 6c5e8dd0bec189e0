use std::sync::Arc;

use courier_service::RequestCoordinator;
use courier_service::config::Config;
use courier_service::transport::ReqwestTransport;

pub use courier_test::{Server, unreachable_url};

/// Setup tests and create a coordinator talking to `server`.
///
/// The `update_config` closure can modify the default configuration before the coordinator is
/// created.
pub fn setup_coordinator(
    server: &Server,
    update_config: impl FnOnce(&mut Config),
) -> RequestCoordinator {
    courier_test::setup();

    let mut config = Config {
        base_url: Some(server.base_url()),
        ..Default::default()
    };
    update_config(&mut config);

    let transport = ReqwestTransport::new(&config).unwrap();
    RequestCoordinator::new(&config, Arc::new(transport), tokio::runtime::Handle::current())
}
