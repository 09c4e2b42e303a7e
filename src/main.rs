use disrupt_rs::{runner, DiConfig, DiError};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: disrupt-rs run <config.json>";

fn main() -> Result<(), DiError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args();
    args.next();

    if let (Some(comm), Some(config_path)) = (args.next(), args.next()) {
        if comm == "run" {
            let config = DiConfig::from_path(&config_path)?;
            runner(&config)?;
            return Ok(());
        }
    }
    eprintln!("{}", USAGE);
    Ok(())
}
