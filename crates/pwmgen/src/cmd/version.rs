use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pwmgen {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pwmgen");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PWMGEN_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: sim={}, cli=true", cfg!(feature = "sim"));
    println!(
        "protocol: greeting={} default_port={}",
        pwmgen_client::message::GREETING,
        pwmgen_transport::DEFAULT_PORT
    );

    Ok(SUCCESS)
}
