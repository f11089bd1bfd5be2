//! `scanforge cancel`: signal cooperative cancellation for a running or
//! paused workflow.

use sf_core::types::WorkflowId;
use sf_core::ExitCode;

use crate::args::Commands;
use crate::config::Config;
use crate::support::{build_engine, map_engine_error};

pub async fn execute(command: Commands, config: &Config) -> Result<(), ExitCode> {
    let Commands::Cancel { workflow_id } = command else {
        unreachable!("dispatch only routes Commands::Cancel here");
    };

    let engine = build_engine(config);
    let id = WorkflowId::new(workflow_id);
    engine.cancel(&id).await.map_err(map_engine_error)?;
    println!("workflow {id} canceled");
    Ok(())
}
