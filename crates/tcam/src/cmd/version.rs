use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("tcam {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("target_os: {}", std::env::consts::OS);
        println!("target_arch: {}", std::env::consts::ARCH);
        println!("spidev: {}", cfg!(target_os = "linux"));
    }
    Ok(SUCCESS)
}
