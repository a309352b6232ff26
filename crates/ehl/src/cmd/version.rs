use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ehl {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ehl");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("EHL_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: channel={}, transaction={}, async={}, cli=true",
        cfg!(feature = "channel"),
        cfg!(feature = "transaction"),
        cfg!(feature = "async")
    );
    println!("default_baud: {}", ehl_transport::DEFAULT_BAUD_RATE);

    Ok(SUCCESS)
}
