use crate::cmd::{finish, ParamsArgs};
use crate::exit::{generator_error, CliResult, SUCCESS};
use crate::output::{print_params, OutputFormat};

pub fn run(args: ParamsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut generator = args.connect.open()?;
    let params = generator.get_parameters();
    finish(generator);

    let params = params.map_err(|err| generator_error("reading parameters failed", err))?;
    print_params(&params, format);
    Ok(SUCCESS)
}
