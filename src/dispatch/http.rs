//! HTTP backend client
//!
//! [`RobotClient`] performs request/response calls against the robot's web
//! backend. [`HttpDispatcher`] puts a single delivery task in front of it so
//! the runner can fire commands without waiting while the backend still sees
//! them one at a time, in order.

use super::{Command, DispatchError, DispatchResult, Dispatcher, Operation, Reply};
use crate::util::config::BackendConfig;
use reqwest::{Client, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Errors while setting up the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid backend url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Serial ports the backend can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPorts {
    /// Port descriptions, in backend order.
    pub ports: Vec<String>,
    /// Index of the preferred Arduino port.
    pub selected: usize,
}

/// Arduino link state after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArduinoLink {
    Connected,
    Disconnected,
}

/// Request/response client for the robot backend.
///
/// Cheap to clone; clones share the connection pool and session cookie.
#[derive(Debug, Clone)]
pub struct RobotClient {
    http: Client,
    base: Url,
}

impl RobotClient {
    /// Create a client for the configured backend.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.url).map_err(|source| ClientError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .cookie_store(true)
            .build()?;
        Ok(Self { http, base })
    }

    /// Backend base url.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn exchange(
        &self,
        path: &str,
        form: &[(&str, String)],
        operation: Operation,
    ) -> DispatchResult<Landing> {
        let url = self
            .base
            .join(path)
            .map_err(|_| DispatchError::Transport(operation))?;
        let response = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                debug!("{} request failed: {}", operation, e);
                DispatchError::Transport(operation)
            })?;
        let url = response.url().clone();
        let success = response.status().is_success();
        let body = response.text().await.map_err(|e| {
            debug!("{} response unreadable: {}", operation, e);
            DispatchError::Transport(operation)
        })?;
        Ok(Landing { url, success, body })
    }

    async fn post(
        &self,
        path: &str,
        form: &[(&str, String)],
        operation: Operation,
    ) -> DispatchResult<Reply> {
        let landing = self.exchange(path, form, operation).await?;
        Reply::decode(&landing.body, operation)
    }

    /// Send one command and wait for the backend's verdict.
    ///
    /// Commands that end the session are acknowledged with a redirect to the
    /// login page instead of a JSON reply.
    pub async fn send(
        &self,
        command: &Command,
    ) -> DispatchResult<()> {
        debug!("-> {} {}", command.endpoint(), command);
        let operation = command.operation();
        let landing = self
            .exchange(command.endpoint(), &command.form(), operation)
            .await?;
        if command.ends_session() && landing.success && landing.on_login_page() {
            debug!("{} acknowledged by redirect to {}", operation, landing.url.path());
            return Ok(());
        }
        Reply::decode(&landing.body, operation).map(|_| ())
    }

    /// Open a session. The backend redirects back to its login page when the
    /// password is wrong.
    pub async fn login(
        &self,
        password: &str,
    ) -> DispatchResult<()> {
        let operation = Operation::Login;
        let url = self
            .base
            .join("/login_request")
            .map_err(|_| DispatchError::Transport(operation))?;
        let response = self
            .http
            .post(url)
            .form(&[("password", password)])
            .send()
            .await
            .map_err(|e| {
                debug!("login request failed: {}", e);
                DispatchError::Transport(operation)
            })?;

        if on_login_page(response.url()) {
            return Err(DispatchError::Rejected {
                operation,
                message: "wrong password".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(DispatchError::Transport(operation));
        }
        Ok(())
    }

    /// Battery reading reported by the Arduino, `None` while unknown.
    pub async fn battery(&self) -> DispatchResult<Option<u32>> {
        let operation = Operation::BatteryStatus;
        let reply = self
            .post("/arduinoStatus", &[("type", "battery".to_string())], operation)
            .await?;
        Ok(reply.fields.get("battery").and_then(battery_level))
    }

    /// Serial ports visible to the backend.
    pub async fn serial_ports(&self) -> DispatchResult<SerialPorts> {
        let operation = Operation::ListPorts;
        let reply = self
            .post("/arduinoConnect", &[("action", "updateList".to_string())], operation)
            .await?;
        let ports = reply
            .fields
            .get("ports")
            .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
            .ok_or(DispatchError::Transport(operation))?;
        let selected = reply
            .fields
            .get("portSelect")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        Ok(SerialPorts { ports, selected })
    }

    /// Connect to the Arduino on `port`, or disconnect if already connected.
    pub async fn toggle_arduino(
        &self,
        port: usize,
    ) -> DispatchResult<ArduinoLink> {
        let operation = Operation::ToggleArduino;
        let form = [("action", "reconnect".to_string()), ("port", port.to_string())];
        let reply = self.post("/arduinoConnect", &form, operation).await?;
        match reply.fields.get("arduino").and_then(|v| v.as_str()) {
            Some("Connected") => Ok(ArduinoLink::Connected),
            Some("Disconnected") => Ok(ArduinoLink::Disconnected),
            _ => Err(DispatchError::Transport(operation)),
        }
    }
}

/// Where a request ended up after redirects.
struct Landing {
    url: Url,
    success: bool,
    body: String,
}

impl Landing {
    fn on_login_page(&self) -> bool {
        on_login_page(&self.url)
    }
}

fn on_login_page(url: &Url) -> bool {
    url.path().starts_with("/login")
}

/// The backend forwards the raw serial value, either as a number or a
/// string; `-999` means no reading yet.
pub(crate) fn battery_level(value: &serde_json::Value) -> Option<u32> {
    let level = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    u32::try_from(level).ok()
}

/// Fire-and-forget dispatcher over HTTP.
///
/// Commands are queued and delivered by one background task, so the backend
/// receives them strictly in dispatch order. Failures are forwarded to the
/// notice channel.
#[derive(Debug)]
pub struct HttpDispatcher {
    queue: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl HttpDispatcher {
    /// Start the delivery task on `runtime`.
    pub fn spawn(
        client: RobotClient,
        runtime: &Handle,
        notices: mpsc::UnboundedSender<DispatchError>,
    ) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel::<Command>();
        let worker = runtime.spawn(async move {
            while let Some(command) = pending.recv().await {
                if let Err(err) = client.send(&command).await {
                    warn!("{}", err);
                    // Nobody listening is fine; the warning was logged.
                    let _ = notices.send(err);
                }
            }
        });
        Self { queue, worker }
    }

    /// Stop accepting commands and wait until the queued ones are delivered.
    pub async fn settle(self) {
        drop(self.queue);
        if let Err(e) = self.worker.await {
            warn!("dispatcher task ended abnormally: {}", e);
        }
    }
}

impl Dispatcher for HttpDispatcher {
    fn dispatch(
        &self,
        command: Command,
    ) {
        if let Err(mpsc::error::SendError(command)) = self.queue.send(command) {
            warn!("dispatcher is shut down, dropping {}", command);
        }
    }
}
