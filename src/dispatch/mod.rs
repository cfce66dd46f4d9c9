//! Command dispatch
//!
//! The robot backend exposes one form-encoded POST endpoint per primitive and
//! answers with `{"status": "OK" | "Error", "msg": ...}`. [`Dispatcher`] is
//! the fire-and-forget seam the runner talks to; [`http`] holds the real
//! implementation on top of `reqwest`.

pub mod http;

pub use http::{ArduinoLink, HttpDispatcher, RobotClient, SerialPorts};

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Dispatch result
pub type DispatchResult<T> = Result<T, DispatchError>;

/// A named backend operation, used in user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    MoveMotor,
    SetServo,
    PlayAudio,
    Speak,
    Animate,
    UpdateSetting,
    Login,
    BatteryStatus,
    ListPorts,
    ToggleArduino,
}

impl fmt::Display for Operation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Operation::MoveMotor => "motor movement",
            Operation::SetServo => "servo control",
            Operation::PlayAudio => "audio playback",
            Operation::Speak => "speech",
            Operation::Animate => "animation",
            Operation::UpdateSetting => "settings update",
            Operation::Login => "login",
            Operation::BatteryStatus => "battery status",
            Operation::ListPorts => "serial port listing",
            Operation::ToggleArduino => "arduino connection",
        };
        f.write_str(name)
    }
}

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The backend answered with `status: "Error"`.
    #[error("{operation} failed: {message}")]
    Rejected { operation: Operation, message: String },

    /// No usable response arrived.
    #[error("unable to perform {0}")]
    Transport(Operation),
}

impl DispatchError {
    /// The operation that failed.
    pub fn operation(&self) -> Operation {
        match self {
            DispatchError::Rejected { operation, .. } => *operation,
            DispatchError::Transport(operation) => *operation,
        }
    }
}

/// Robot settings accepted by the `/settings` endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    /// Motor dead-zone threshold.
    MotorDeadzone(i32),
    /// Steering trim.
    SteeringOffset(i32),
    /// Automatic (`1`) or manual (`0`) idle animations.
    AnimationMode(i32),
    /// Sound effect volume, 0-10.
    Volume(u8),
    /// Toggle the camera stream.
    Streamer,
    /// Restart the web interface.
    Restart,
    /// Shut the robot's computer down.
    Shutdown,
}

impl Setting {
    /// Parse a `kind value` pair as typed on the command line.
    pub fn parse(
        kind: &str,
        value: &str,
    ) -> Option<Self> {
        let setting = match kind {
            "motorOff" | "motor-deadzone" => Setting::MotorDeadzone(value.parse().ok()?),
            "steerOff" | "steering-offset" => Setting::SteeringOffset(value.parse().ok()?),
            "animeMode" | "animation-mode" => Setting::AnimationMode(value.parse().ok()?),
            "volume" => Setting::Volume(value.parse().ok().filter(|v| *v <= 10)?),
            "streamer" => Setting::Streamer,
            "restart" => Setting::Restart,
            "shutdown" => Setting::Shutdown,
            _ => return None,
        };
        Some(setting)
    }

    /// Backend `type` field.
    pub fn key(&self) -> &'static str {
        match self {
            Setting::MotorDeadzone(_) => "motorOff",
            Setting::SteeringOffset(_) => "steerOff",
            Setting::AnimationMode(_) => "animeMode",
            Setting::Volume(_) => "volume",
            Setting::Streamer => "streamer",
            Setting::Restart => "restart",
            Setting::Shutdown => "shutdown",
        }
    }

    /// Backend `value` field.
    pub fn value(&self) -> String {
        match self {
            Setting::MotorDeadzone(v) | Setting::SteeringOffset(v) | Setting::AnimationMode(v) => {
                v.to_string()
            }
            Setting::Volume(v) => v.to_string(),
            Setting::Streamer | Setting::Restart | Setting::Shutdown => "1".to_string(),
        }
    }
}

/// A fire-and-forget backend command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Drive with joystick coordinates in `[-1, 1]`.
    MoveMotor { x: f64, y: f64 },
    SetServo { servo: String, value: f64 },
    PlayAudio { clip: String },
    Speak { text: String },
    Animate { clip: String },
    UpdateSetting(Setting),
}

impl Command {
    /// Backend endpoint path.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Command::MoveMotor { .. } => "/motor",
            Command::SetServo { .. } => "/servoControl",
            Command::PlayAudio { .. } => "/audio",
            Command::Speak { .. } => "/tts",
            Command::Animate { .. } => "/animate",
            Command::UpdateSetting(_) => "/settings",
        }
    }

    /// Operation name for messages.
    pub fn operation(&self) -> Operation {
        match self {
            Command::MoveMotor { .. } => Operation::MoveMotor,
            Command::SetServo { .. } => Operation::SetServo,
            Command::PlayAudio { .. } => Operation::PlayAudio,
            Command::Speak { .. } => Operation::Speak,
            Command::Animate { .. } => Operation::Animate,
            Command::UpdateSetting(_) => Operation::UpdateSetting,
        }
    }

    /// Whether the backend drops the session when handling this command.
    pub fn ends_session(&self) -> bool {
        matches!(self, Command::UpdateSetting(Setting::Restart))
    }

    /// Form payload.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            Command::MoveMotor { x, y } => vec![("stickX", x.to_string()), ("stickY", y.to_string())],
            Command::SetServo { servo, value } => {
                vec![("servo", servo.clone()), ("value", value.to_string())]
            }
            Command::PlayAudio { clip } | Command::Animate { clip } => vec![("clip", clip.clone())],
            Command::Speak { text } => vec![("text", text.clone())],
            Command::UpdateSetting(setting) => {
                vec![("type", setting.key().to_string()), ("value", setting.value())]
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Command::MoveMotor { x, y } => write!(f, "moveMotor({:.1}, {:.1})", x, y),
            Command::SetServo { servo, value } => write!(f, "setServo({}, {})", servo, value),
            Command::PlayAudio { clip } => write!(f, "playAudio({})", clip),
            Command::Speak { text } => write!(f, "speak({:?})", text),
            Command::Animate { clip } => write!(f, "animate({})", clip),
            Command::UpdateSetting(setting) => {
                write!(f, "setting({}, {})", setting.key(), setting.value())
            }
        }
    }
}

/// Issues backend commands without waiting for their outcome.
///
/// Implementations must return immediately; failures are reported out of
/// band. Each call is attempted once.
pub trait Dispatcher {
    /// Send one command.
    fn dispatch(
        &self,
        command: Command,
    );

    /// Drive the motors.
    fn move_motor(
        &self,
        x: f64,
        y: f64,
    ) {
        self.dispatch(Command::MoveMotor { x, y });
    }

    /// Move a servo.
    fn set_servo(
        &self,
        servo: &str,
        value: f64,
    ) {
        self.dispatch(Command::SetServo {
            servo: servo.to_string(),
            value,
        });
    }

    /// Play a sound clip.
    fn play_audio(
        &self,
        clip: &str,
    ) {
        self.dispatch(Command::PlayAudio {
            clip: clip.to_string(),
        });
    }

    /// Speak a line of text.
    fn speak(
        &self,
        text: &str,
    ) {
        self.dispatch(Command::Speak {
            text: text.to_string(),
        });
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for &D {
    fn dispatch(
        &self,
        command: Command,
    ) {
        (**self).dispatch(command)
    }
}

/// Reply status of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReplyStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

/// Backend JSON reply.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub msg: Option<String>,
    /// Endpoint specific fields (`battery`, `ports`, `arduino`, ...).
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Reply {
    /// Turn an `Error` reply into a [`DispatchError::Rejected`].
    pub fn into_result(
        self,
        operation: Operation,
    ) -> DispatchResult<Self> {
        match self.status {
            ReplyStatus::Ok => Ok(self),
            ReplyStatus::Error => Err(DispatchError::Rejected {
                operation,
                message: self
                    .msg
                    .unwrap_or_else(|| "backend reported an error".to_string()),
            }),
        }
    }

    /// Decode a raw response body.
    ///
    /// Anything that is not a reply (e.g. the login page served after the
    /// session expired) counts as a transport failure.
    pub fn decode(
        body: &str,
        operation: Operation,
    ) -> DispatchResult<Self> {
        let reply: Reply =
            serde_json::from_str(body).map_err(|_| DispatchError::Transport(operation))?;
        reply.into_result(operation)
    }
}
