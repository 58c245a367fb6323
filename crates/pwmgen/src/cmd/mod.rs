use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use pwmgen_client::{connect_with_config, Generator, GeneratorConfig};
use tracing::info;

use crate::exit::{generator_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod freq;
pub mod info;
pub mod monitor;
pub mod params;
pub mod set;
pub mod simulate;
pub mod version;

/// Address used when neither an argument nor `PWMGEN_ADDR` is given.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:1234";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Greet the generator and print its identification.
    Info(InfoArgs),
    /// Print the parameters of every channel.
    Params(ParamsArgs),
    /// Set channel parameters, then print the resulting configuration.
    Set(SetArgs),
    /// Sample the pulse generation frequency once.
    Freq(FreqArgs),
    /// Sample the pulse generation frequency periodically.
    Monitor(MonitorArgs),
    /// Run a simulated generator.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Params(args) => params::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Freq(args) => freq::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Simulate(args) => simulate::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Generator address: host:port, host (port 1234) or unix:<path>.
    #[arg(env = "PWMGEN_ADDR", default_value = DEFAULT_ADDRESS)]
    pub address: String,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Per-response timeout. Waits indefinitely when not set.
    #[arg(long, value_name = "DURATION")]
    pub read_timeout: Option<String>,
}

impl ConnectArgs {
    /// Open a session, reporting failures with CLI exit codes.
    pub fn open(&self) -> CliResult<Generator> {
        let config = GeneratorConfig {
            connect_timeout: Some(parse_duration(&self.timeout)?),
            read_timeout: self
                .read_timeout
                .as_deref()
                .map(parse_duration)
                .transpose()?,
            ..GeneratorConfig::default()
        };
        let generator = connect_with_config(&self.address, config)
            .map_err(|err| generator_error("connect failed", err))?;
        info!(
            address = %self.address,
            device = generator.device_id().unwrap_or_default(),
            "connected"
        );
        Ok(generator)
    }
}

/// Close a session at the end of a command. A close failure does not
/// change the outcome of the command.
pub fn finish(mut generator: Generator) {
    if let Err(err) = generator.close() {
        tracing::warn!(error = %err, "close failed");
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct ParamsArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// JSON file with channel parameters: `{"0": {"type": "CST", "average": 0.1}}`
    /// or the output of `params --format json`.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
    /// Inline channel: `CH:KIND:AVG` or `CH:KIND:AVG:AMP:PERIOD:START`.
    /// Repeatable; overrides entries from --file.
    #[arg(long = "channel", short = 'c', value_name = "SPEC")]
    pub channels: Vec<String>,
}

#[derive(Args, Debug)]
pub struct FreqArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Time between samples (e.g. 3s, 500ms).
    #[arg(long, default_value = "3s")]
    pub interval: String,
    /// Stop after N samples.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on: host:port or unix:<path>.
    #[arg(default_value = DEFAULT_ADDRESS)]
    pub address: String,
    /// Number of channels.
    #[arg(long, default_value_t = pwmgen_client::sim::DEFAULT_CHANNELS)]
    pub channels: usize,
    /// Identification sent in the greeting.
    #[arg(long, default_value = pwmgen_client::sim::DEFAULT_IDENTITY)]
    pub identity: String,
    /// Exit after serving N clients.
    #[arg(long)]
    pub max_connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
