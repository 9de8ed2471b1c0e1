use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("chanmux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: chanmux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("CHANMUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: peer={}, cli=true",
        cfg!(feature = "peer")
    );
    println!(
        "defaults: send_buffer_size={}, recv_buffer_size={}, max_frame_size={}",
        chanmux_mux::DEFAULT_SEND_BUFFER_SIZE,
        chanmux_mux::DEFAULT_RECV_BUFFER_SIZE,
        chanmux_mux::DEFAULT_MAX_FRAME_SIZE
    );

    Ok(SUCCESS)
}
