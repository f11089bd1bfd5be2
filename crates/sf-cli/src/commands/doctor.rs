//! `scanforge doctor`: environment diagnostics for adapter binaries, the
//! tokio runtime, and the host platform.

use sf_core::ExitCode;
use sf_doctor::DoctorCommand;

use crate::args::Commands;
use crate::support::emit;

pub async fn execute(command: Commands) -> Result<(), ExitCode> {
    let Commands::Doctor { strict, json } = command else {
        unreachable!("dispatch only routes Commands::Doctor here");
    };

    let output = DoctorCommand::new().run(strict);
    let ok = output.ok;

    emit(&output, json, |output| {
        for check in &output.checks {
            println!("[{:?}] {}: {}", check.status, check.name, check.details);
        }
        println!("overall: {}", if output.ok { "ok" } else { "failed" });
    });

    if ok {
        Ok(())
    } else {
        Err(ExitCode::EXECUTION_FAILED)
    }
}
