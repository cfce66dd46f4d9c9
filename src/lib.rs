//! Walle robot programs
//!
//! Runs small block programs (`move`, `turn`, `wait`, `speak`, ...) against
//! the web backend of a Wall-E style robot. Statements that take time are
//! executed cooperatively: the runner suspends on a one-shot timer instead
//! of blocking, so a run can be stopped at any moment.
//!
//! # Example
//!
//! ```text
//! # square.walle
//! move forward 20
//! turn right 90
//! wait 0.5
//! speak "done"
//! ```
//!
//! ```no_run
//! use std::path::Path;
//! use walle::{simulate_file, runtime::MotionProfile, Result};
//!
//! fn main() -> Result<()> {
//!     let sim = simulate_file(Path::new("square.walle"), MotionProfile::default())?;
//!     println!("takes {:?}", sim.elapsed);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/walle")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod dispatch;
pub mod program;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

use std::path::Path;
use dispatch::RobotClient;
use program::Program;
use runtime::host::{self, HostReport};
use runtime::sim::{self, Simulation};
use runtime::MotionProfile;
use tracing::{debug, info};
use util::config::Config;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool name
pub const NAME: &str = "walle";

/// Load a program file (`.json` block export or text script).
pub fn load_program(path: &Path) -> Result<Program> {
    debug!("loading program from {}", path.display());
    let program = Program::load(path)
        .with_context(|| format!("Failed to load program: {}", path.display()))?;
    debug!("loaded {} statements", program.len());
    Ok(program)
}

/// Load a program file and validate it without running anything.
pub fn check_file(path: &Path) -> Result<Program> {
    let program = load_program(path)?;
    program
        .validate()
        .with_context(|| format!("Invalid program: {}", path.display()))?;
    Ok(program)
}

/// Dry-run a program file on a simulated clock.
pub fn simulate_file(
    path: &Path,
    profile: MotionProfile,
) -> Result<Simulation> {
    let program = load_program(path)?;
    Ok(sim::simulate(program, profile))
}

/// Open a backend client, logging in when a password is configured.
pub async fn connect(config: &Config) -> Result<RobotClient> {
    let client = RobotClient::new(&config.backend)?;
    if let Some(password) = &config.backend.password {
        client
            .login(password)
            .await
            .with_context(|| format!("Failed to log in to {}", client.base_url()))?;
        debug!("logged in to {}", client.base_url());
    }
    Ok(client)
}

/// Run a program file on the robot until it finishes or Ctrl-C is pressed.
pub async fn run_file(
    path: &Path,
    config: &Config,
) -> Result<HostReport> {
    let program = check_file(path)?;
    let client = connect(config).await?;
    info!("running {} on {}", path.display(), client.base_url());
    Ok(host::execute(program, client, config.motion).await)
}
