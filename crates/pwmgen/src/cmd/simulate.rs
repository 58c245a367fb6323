use pwmgen_client::SimulatedDevice;
use pwmgen_transport::{DeviceAddress, DeviceListener};
use tracing::info;

use crate::cmd::SimulateArgs;
use crate::exit::{generator_error, transport_error, CliError, CliResult, SUCCESS};

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    if args.channels == 0 {
        return Err(CliError::usage("--channels must be at least 1"));
    }
    let address: DeviceAddress = args
        .address
        .parse()
        .map_err(|err| transport_error("invalid listen address", err))?;
    let listener =
        DeviceListener::bind(&address).map_err(|err| transport_error("bind failed", err))?;
    let local = listener
        .local_address()
        .map_err(|err| transport_error("bind failed", err))?;
    info!(address = %local, channels = args.channels, "simulated generator listening");

    let mut device = SimulatedDevice::new()
        .with_channels(args.channels)
        .with_identity(args.identity);
    device
        .run(&listener, args.max_connections)
        .map_err(|err| generator_error("simulator stopped", err))?;
    Ok(SUCCESS)
}
