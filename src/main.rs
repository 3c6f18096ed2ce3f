use anyhow::Result;
use clap::{CommandFactory, Parser};
use meetbot::cli::{
    handle_check_params_command, handle_config_command, handle_parse_url_command, Cli, CliCommand,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("meetbot {}", env!("CARGO_PKG_VERSION"));
        }
        Some(CliCommand::ParseUrl(args)) => handle_parse_url_command(args)?,
        Some(CliCommand::CheckParams(args)) => handle_check_params_command(args)?,
        Some(CliCommand::Config(args)) => handle_config_command(args)?,
        None => Cli::command().print_help()?,
    }

    Ok(())
}
