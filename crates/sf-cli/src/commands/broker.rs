//! `scanforge broker`: serve the JSON-RPC 2.0 tool broker on stdio. Intended
//! to be spawned by an embedding agent runtime, not run interactively.

use std::sync::Arc;

use sf_broker::{BackpressurePolicy, BrokerConfig, BrokerSession, InMemoryResourceProvider};
use sf_core::ExitCode;

use crate::args::Commands;

pub async fn execute(command: Commands) -> Result<(), ExitCode> {
    let Commands::Broker { max_parallel_calls } = command else {
        unreachable!("dispatch only routes Commands::Broker here");
    };

    let registry = Arc::new(sf_adapters::default_registry());
    let resources = Arc::new(InMemoryResourceProvider::new());
    let config = BrokerConfig { max_parallel_calls, backpressure: BackpressurePolicy::Reject };
    let session = Arc::new(BrokerSession::new(registry, resources, config));

    sf_broker::serve_stdio(session).await.map_err(|err| {
        tracing::error!(error = %err, "broker stdio loop failed");
        ExitCode::INTERNAL
    })
}
