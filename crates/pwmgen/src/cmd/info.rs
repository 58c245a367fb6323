use pwmgen_client::DeviceIdentity;
use serde::Serialize;

use crate::cmd::{finish, InfoArgs};
use crate::exit::{generator_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    address: String,
    identity: DeviceIdentity,
    channels: usize,
    connected: bool,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut generator = args.connect.open()?;
    let raw = generator.device_id().unwrap_or_default().to_string();
    let params = generator.get_parameters();
    finish(generator);
    let channels = params
        .map_err(|err| generator_error("reading parameters failed", err))?
        .len();

    let out = InfoOutput {
        address: args.connect.address,
        identity: DeviceIdentity::parse(&raw),
        channels,
        connected: true,
    };
    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    let firmware = out.identity.firmware_version.as_deref().unwrap_or("unknown");
    let resolution = out
        .identity
        .resolution_bits
        .map(|bits| format!("{bits} bits"))
        .unwrap_or_else(|| "unknown".to_string());

    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "DEVICE", "FIRMWARE", "RESOLUTION", "CHANNELS"]);
            table.add_row(vec![
                out.address.clone(),
                out.identity.raw.clone(),
                firmware.to_string(),
                resolution,
                out.channels.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Generator Info:");
            println!("  Address:    {}", out.address);
            println!("  Device:     {}", out.identity.raw);
            println!("  Firmware:   {firmware}");
            println!("  Resolution: {resolution}");
            println!("  Channels:   {}", out.channels);
        }
        OutputFormat::Raw => println!("{}", out.identity.raw),
    }
}
