use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::app::session_timeouts;
use crate::config::{Config, SessionParams};
use crate::meeting::{detect_platform, parse_meet_url, MeetingPlatform};

#[derive(Parser, Debug)]
#[command(name = "meetbot")]
#[command(about = "Session lifecycle tools for the meeting recorder bot", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Identify the platform of a meeting URL and print its canonical link
    ParseUrl(ParseUrlArgs),
    /// Validate a session parameters file and show the effective budgets
    CheckParams(CheckParamsArgs),
    /// Show the current configuration
    Config(ConfigCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct ParseUrlArgs {
    /// Meeting URL or a block of join text containing one
    pub url: String,
}

#[derive(ClapArgs, Debug)]
pub struct CheckParamsArgs {
    /// JSON file with the session parameters
    pub file: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct ConfigCliArgs {
    /// Only print the path of the config file
    #[arg(long)]
    pub path: bool,
}

pub fn handle_parse_url_command(args: ParseUrlArgs) -> Result<()> {
    println!("{}", describe_url(&args.url)?);
    Ok(())
}

pub fn handle_check_params_command(args: CheckParamsArgs) -> Result<()> {
    let params = SessionParams::from_file(&args.file)
        .with_context(|| format!("Invalid session parameters in {:?}", args.file))?;
    let config = Config::load()?;

    print!("{}", describe_params(&params, &config));
    Ok(())
}

pub fn handle_config_command(args: ConfigCliArgs) -> Result<()> {
    let path = Config::config_path()?;
    if args.path {
        println!("{}", path.display());
        return Ok(());
    }

    let config = Config::load()?;
    println!("# {}", path.display());
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}

fn describe_url(raw: &str) -> Result<String> {
    let platform = detect_platform(raw)?;
    let mut out = format!("Platform: {}", platform);

    if platform == MeetingPlatform::Meet {
        let meeting = parse_meet_url(raw)?;
        out.push_str(&format!("\nLink:     {}", meeting.meeting_id));
    }

    Ok(out)
}

fn describe_params(params: &SessionParams, config: &Config) -> String {
    let timeouts = session_timeouts(config, params);
    let branding = params.custom_branding_bot_path.as_deref().unwrap_or("none");

    let lines = [
        "Session parameters OK".to_string(),
        format!("  Meeting URL:     {}", params.meeting_url),
        format!("  Bot:             {} ({})", params.bot_name, params.bot_uuid),
        format!("  Environment:     {}", params.environ.as_str()),
        format!("  Recording mode:  {:?}", params.recording_mode),
        format!("  Branding:        {}", branding),
        "Budgets".to_string(),
        format!("  Waiting room:    {}s", timeouts.waiting_room.as_secs()),
        format!("  Setup:           {}s", timeouts.setup.as_secs()),
        format!("  Recording:       {}s", timeouts.recording.as_secs()),
        format!("  Silence:         {}s", timeouts.silence.as_secs()),
        format!("  Max pause:       {}s", timeouts.max_pause.as_secs()),
        format!("  Cleanup:         {}s", timeouts.cleanup.as_secs()),
    ];

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
