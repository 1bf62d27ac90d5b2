use botwarden::config::SupervisorConfig;
use botwarden::{logging, supervisor};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = logging::init(None) {
        eprintln!("failed to initialize logging: {}", err);
        return ExitCode::from(1);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-V") {
        println!("botwarden {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(0);
    }

    // Configuration failures happen here, before any child exists.
    let config = match SupervisorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err.user_message());
            return ExitCode::from(1);
        }
    };

    match supervisor::supervise(config.child_specs()).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{}", err.user_message());
            ExitCode::from(1)
        }
    }
}
