use clap::Parser;
use engine_host::args::Args;
use engine_host::config::EngineConfig;
use engine_host::logging;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_path = args.config_path();

    if args.write_config {
        EngineConfig::default().save(&config_path)?;
        println!("Wrote default config to {}", config_path.display());
        return Ok(());
    }

    let mut config = EngineConfig::load(&config_path)?;
    if args.nocache {
        config.loader.cache_bust = true;
    }

    let log_guard = logging::init(args.verbose, config.logging.directory.as_deref())?;
    tracing::info!("Logging to {}", log_guard.log_file.display());
    if !config_path.exists() {
        tracing::warn!("No config at {}, using defaults", config_path.display());
    }

    let engine = match engine_host::boot(&config) {
        Ok(engine) => engine,
        Err(err) => {
            tracing::error!("Engine failed to start: {:#}", err);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    if args.dot {
        print!("{}", engine.modules().to_dot());
    }
    tracing::info!(
        "{} module(s) initialized: {:?}",
        engine.modules().load_order().len(),
        engine.modules().load_order()
    );
    Ok(())
}
