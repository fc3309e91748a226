use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ringbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ringbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "defaults: listen=0.0.0.0:{} collector=127.0.0.1:{} max_frame={}",
        ringbridge_relay::DEFAULT_INGRESS_PORT,
        ringbridge_relay::DEFAULT_COLLECTOR_PORT,
        ringbridge_frame::DEFAULT_MAX_FRAME
    );

    Ok(SUCCESS)
}
