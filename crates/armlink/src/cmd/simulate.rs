use armlink::simulator::{Simulator, SimulatorConfig};

use crate::cmd::{install_ctrlc_handler, SimulateArgs};
use crate::exit::{simulator_error, CliResult, SUCCESS};

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let simulator = Simulator::bind(SimulatorConfig {
        bind: args.bind,
        rate_hz: args.rate_hz,
        noise: !args.no_noise,
    })
    .map_err(|err| simulator_error("simulator failed to start", err))?;

    install_ctrlc_handler(simulator.running_flag())?;
    simulator
        .run()
        .map_err(|err| simulator_error("simulator failed", err))?;
    Ok(SUCCESS)
}
