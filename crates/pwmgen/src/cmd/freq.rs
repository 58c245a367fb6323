use crate::cmd::{finish, FreqArgs};
use crate::exit::{generator_error, CliResult, SUCCESS};
use crate::output::{print_frequency, OutputFormat};

pub fn run(args: FreqArgs, format: OutputFormat) -> CliResult<i32> {
    let mut generator = args.connect.open()?;
    let frequency = generator.get_frequency();
    finish(generator);

    let frequency = frequency.map_err(|err| generator_error("frequency query failed", err))?;
    print_frequency(&frequency, format);
    Ok(SUCCESS)
}
