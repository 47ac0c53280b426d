use armlink_robot::JOINT_COUNT;
use armlink_transport::{DEFAULT_HOST, DEFAULT_PORT};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("armlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: armlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("ARMLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("joints: {JOINT_COUNT}");
    println!("default_endpoint: tcp://{DEFAULT_HOST}:{DEFAULT_PORT}");
    println!("transports: serial, tcp, udp");
    println!(
        "features: simulator={}, cli=true",
        cfg!(feature = "simulator")
    );

    Ok(SUCCESS)
}
