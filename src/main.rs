//! Walle - CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use walle::dispatch::{ArduinoLink, Command, RobotClient, Setting};
use walle::runtime::sim::Event;
use walle::runtime::RunOutcome;
use walle::util::config::{self, Config};
use walle::util::logger::{self, LogLevel};
use walle::{check_file, connect, run_file, simulate_file, NAME, VERSION};

/// Program and drive a Wall-E robot through its web backend
#[derive(Parser, Debug)]
#[command(name = "walle")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./walle.toml, then ~/.config/walle/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base url
    #[arg(long, global = true, value_name = "URL")]
    backend: Option<String>,

    /// Backend password
    #[arg(long, global = true)]
    password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program on the robot
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check a program for errors without running it
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Dry-run a program on a simulated clock and print its timeline
    Simulate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Drive the motors with joystick coordinates in [-1, 1]
    Drive {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Move a servo
    Servo { id: String, value: f64 },

    /// Play a sound clip
    Audio { clip: String },

    /// Speak a line of text
    Speak { text: String },

    /// Play an animation
    Animate { clip: String },

    /// Stop the motors
    Halt,

    /// Print the battery level
    Battery,

    /// List serial ports the backend can see
    Ports,

    /// Connect to (or disconnect from) the Arduino on a port
    Connect { port: usize },

    /// Change a robot setting
    Setting {
        kind: String,
        #[arg(default_value = "1", allow_negative_numbers = true)]
        value: String,
    },

    /// Write the effective configuration (default: the user config file)
    SaveConfig {
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },
}

fn load(args: &Args) -> Result<Config> {
    let mut config = config::load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(url) = &args.backend {
        config.backend.url = url.clone();
    }
    if let Some(password) = &args.password {
        config.backend.password = Some(password.clone());
    }
    if args.verbose {
        config.log.level = LogLevel::Debug;
    }
    Ok(config)
}

async fn send(
    client: &RobotClient,
    command: Command,
) -> Result<()> {
    client.send(&command).await?;
    println!("{} {}", "ok".green(), command);
    Ok(())
}

fn print_timeline(
    file: &std::path::Path,
    config: &Config,
) -> Result<()> {
    let sim = simulate_file(file, config.motion)?;
    for record in &sim.records {
        let at = format!("{:>8.3}s", record.at.as_secs_f64());
        match &record.event {
            Event::Dispatched(command) => println!("{}  {}", at.dimmed(), command),
            Event::Highlight(Some(id)) => println!("{}  {} {}", at.dimmed(), ">".cyan(), id),
            Event::Highlight(None) => {}
            Event::Finished(outcome) => println!("{}  {}", at.dimmed(), outcome_label(outcome)),
        }
    }
    println!("total {:.3}s", sim.elapsed.as_secs_f64());
    match sim.outcome {
        Some(RunOutcome::Rejected(err)) => bail!("program rejected: {}", err),
        _ => Ok(()),
    }
}

fn outcome_label(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed => "completed".green().to_string(),
        RunOutcome::Stopped => "stopped".yellow().to_string(),
        RunOutcome::Rejected(err) => format!("{} {}", "rejected:".red(), err),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;
    logger::init_with_level(config.log.level);

    match args.command {
        Commands::Run { file } => {
            let report = run_file(&file, &config)
                .await
                .with_context(|| format!("Failed to run: {}", file.display()))?;
            for failure in &report.failures {
                eprintln!("{} {}", "error:".red(), failure);
            }
            match report.outcome {
                Some(outcome) => println!("{}", outcome_label(&outcome)),
                None => println!("{}", "not started".yellow()),
            }
        }
        Commands::Check { file } => {
            let program = check_file(&file)?;
            eprintln!("Check passed! ({} statements)", program.len());
        }
        Commands::Simulate { file } => {
            print_timeline(&file, &config)?;
        }
        Commands::Drive { x, y } => {
            if !(-1.0..=1.0).contains(&x) || !(-1.0..=1.0).contains(&y) {
                bail!("joystick coordinates must lie in [-1, 1]");
            }
            let client = connect(&config).await?;
            send(&client, Command::MoveMotor { x, y }).await?;
        }
        Commands::Servo { id, value } => {
            let client = connect(&config).await?;
            send(&client, Command::SetServo { servo: id, value }).await?;
        }
        Commands::Audio { clip } => {
            let client = connect(&config).await?;
            send(&client, Command::PlayAudio { clip }).await?;
        }
        Commands::Speak { text } => {
            let client = connect(&config).await?;
            send(&client, Command::Speak { text }).await?;
        }
        Commands::Animate { clip } => {
            let client = connect(&config).await?;
            send(&client, Command::Animate { clip }).await?;
        }
        Commands::Halt => {
            let client = connect(&config).await?;
            send(&client, Command::MoveMotor { x: 0.0, y: 0.0 }).await?;
        }
        Commands::Battery => {
            let client = connect(&config).await?;
            match client.battery().await? {
                Some(level) => println!("battery: {}%", level),
                None => println!("battery: {}", "unknown".yellow()),
            }
        }
        Commands::Ports => {
            let client = connect(&config).await?;
            let ports = client.serial_ports().await?;
            for (i, port) in ports.ports.iter().enumerate() {
                let marker = if i == ports.selected { "*" } else { " " };
                println!("{} [{}] {}", marker.cyan(), i, port);
            }
        }
        Commands::Connect { port } => {
            let client = connect(&config).await?;
            match client.toggle_arduino(port).await? {
                ArduinoLink::Connected => println!("{}", "connected".green()),
                ArduinoLink::Disconnected => println!("{}", "disconnected".yellow()),
            }
        }
        Commands::SaveConfig { path } => {
            let written = match path {
                Some(path) => {
                    config::save_config(&config, &path)?;
                    path
                }
                None => config::save_user_config(&config)?,
            };
            println!("{} {}", "saved".green(), written.display());
        }
        Commands::Setting { kind, value } => {
            let Some(setting) = Setting::parse(&kind, &value) else {
                bail!("unknown setting `{}` or invalid value `{}`", kind, value);
            };
            let client = connect(&config).await?;
            send(&client, Command::UpdateSetting(setting)).await?;
        }
    }

    Ok(())
}
