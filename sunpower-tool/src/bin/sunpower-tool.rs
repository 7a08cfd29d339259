pub mod cli;

use std::io;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use itertools::Itertools;
use log::error;

use sunpower_lib::report::LogReporter;
use sunpower_lib::{Config, ParsedValue, Reply, SunpowerCryocooler};

use cli::{Cli, Commands, CoolerState};

enum OutputFormat {
    Plain,
    Json,
}

fn value_to_json(value: &ParsedValue) -> json::JsonValue {
    match value {
        ParsedValue::Bool(b) => (*b).into(),
        ParsedValue::Int(i) => (*i).into(),
        ParsedValue::Float(x) => (*x).into(),
        ParsedValue::Str(s) => s.as_str().into(),
    }
}

fn format_value(value: &ParsedValue, fmt: &OutputFormat) -> String {
    match fmt {
        OutputFormat::Plain => value.to_string(),
        OutputFormat::Json => json::stringify(value_to_json(value)),
    }
}

fn format_reply(reply: Reply, fmt: &OutputFormat) -> String {
    match fmt {
        OutputFormat::Plain => reply.iter().join("\n"),
        OutputFormat::Json => json::stringify(reply.into_lines()),
    }
}

fn run_command(
    cooler: &mut SunpowerCryocooler,
    command: Commands,
    fmt: &OutputFormat,
) -> Result<String> {
    let value = match command {
        Commands::Status => {
            return cooler
                .get_status()
                .map(|reply| format_reply(reply, fmt))
                .context("Failed to read status")
        }
        Commands::Error => cooler.get_error(),
        Commands::Version => cooler.get_version(),
        Commands::ColdHeadTemp => cooler.get_cold_head_temp(),
        Commands::RejectTemp => cooler.get_reject_temp(),
        Commands::TargetTemp => cooler.get_target_temp(),
        Commands::SetTargetTemp { kelvin } => cooler
            .set_target_temp(kelvin)
            .with_context(|| format!("Failed to set target temperature to {} K", kelvin)),
        Commands::MeasuredPower => cooler.get_measured_power(),
        Commands::CommandedPower => cooler.get_commanded_power(),
        Commands::SetCommandedPower { watts } => cooler
            .set_commanded_power(watts)
            .with_context(|| format!("Failed to set commanded power to {} W", watts)),
        Commands::CurrentCommandedPower => cooler
            .get_current_commanded_power()
            .map(ParsedValue::Float),
        Commands::Cooler { state } => match state {
            CoolerState::On => cooler.turn_on_cooler(),
            CoolerState::Off => cooler.turn_off_cooler(),
        },
        Commands::Get { item } => cooler
            .read_atomic(item)
            .with_context(|| format!("Failed to read {}", item)),
    }?;

    Ok(format_value(&value, fmt))
}

fn do_main() -> Result<String> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(
            Bash,
            &mut cli::Cli::command(),
            "sunpower-tool",
            &mut io::stdout(),
        );

        return Ok(String::default());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let fmt = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    let config = Config {
        read_timeout: cli.timeout,
        settle_delay: Duration::from_millis(cli.settle_ms),
        force: cli.force,
    };

    let media = cli.device.into_media(cli.baudrate);
    let mut cooler = SunpowerCryocooler::new(config, LogReporter::default());
    cooler
        .connect(media.clone())
        .with_context(|| format!("Can't connect to '{}'", media))?;

    let res = run_command(&mut cooler, cli.command, &fmt);
    let closed = cooler.disconnect();

    let out = res?;
    closed?;
    Ok(out)
}

fn main() {
    match do_main() {
        Ok(s) => println!("{}", s),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}
