//! Environment-driven configuration for the supervised pair.
//!
//! The warden itself takes no CLI arguments; everything operational comes in
//! through the environment. `PORT` is mandatory (we refuse to guess a bind
//! port for the render server), the gunicorn worker count and request timeout
//! are preserved as configuration rather than hardcoded limits.

use crate::error::WardenError;
use crate::logging::warn;
use std::env;
use std::time::Duration;

pub const PORT_ENV: &str = "PORT";
pub const RENDER_WORKERS_ENV: &str = "RENDER_WORKERS";
pub const RENDER_TIMEOUT_ENV: &str = "RENDER_TIMEOUT_SEC";
pub const BOT_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
pub const LEGACY_BOT_TOKEN_ENV: &str = "DISCORD_TOKEN";

pub const BOT_BIN: &str = "python3";
pub const BOT_SCRIPT: &str = "bot.py";
pub const RENDER_BIN: &str = "gunicorn";
pub const RENDER_APP: &str = "render_server:app";
pub const RENDER_BIND_HOST: &str = "0.0.0.0";

pub const RENDER_WORKERS_DEFAULT: u32 = 1;
pub const RENDER_TIMEOUT_DEFAULT: Duration = Duration::from_secs(60);

/// How long the drain phase waits for terminated children to be reaped
/// before the supervisor gives up and exits anyway.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(4);

/// Launch description for one supervised child.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ChildSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human-readable command line for status output.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub port: u16,
    pub render_workers: u32,
    pub render_timeout: Duration,
}

impl SupervisorConfig {
    /// Read configuration from the environment. Fails before any child is
    /// launched when `PORT` is absent or unparsable.
    pub fn from_env() -> Result<Self, WardenError> {
        let raw_port = env::var(PORT_ENV).map_err(|_| {
            WardenError::config(format!(
                "{} is not set; refusing to guess a bind port for the render server",
                PORT_ENV
            ))
        })?;
        let port: u16 = raw_port.trim().parse().map_err(|_| {
            WardenError::config(format!("{}={:?} is not a valid port", PORT_ENV, raw_port))
        })?;

        let render_workers = read_env_u32(RENDER_WORKERS_ENV).unwrap_or(RENDER_WORKERS_DEFAULT);
        let render_timeout = read_env_u32(RENDER_TIMEOUT_ENV)
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(RENDER_TIMEOUT_DEFAULT);

        // The bot exits immediately without a token; say so up front instead
        // of letting the pair flap under the outer orchestrator.
        if env::var(BOT_TOKEN_ENV).is_err() && env::var(LEGACY_BOT_TOKEN_ENV).is_err() {
            warn(format!(
                "{} is not set; the car bot will exit right after startup",
                BOT_TOKEN_ENV
            ));
        }

        Ok(Self {
            port,
            render_workers,
            render_timeout,
        })
    }

    pub fn bot_spec(&self) -> ChildSpec {
        ChildSpec::new("car-bot", BOT_BIN, vec![BOT_SCRIPT.to_string()])
    }

    pub fn render_spec(&self) -> ChildSpec {
        ChildSpec::new(
            "render-server",
            RENDER_BIN,
            vec![
                "--workers".to_string(),
                self.render_workers.to_string(),
                "--timeout".to_string(),
                self.render_timeout.as_secs().to_string(),
                "--bind".to_string(),
                format!("{}:{}", RENDER_BIND_HOST, self.port),
                RENDER_APP.to_string(),
            ],
        )
    }

    pub fn child_specs(&self) -> Vec<ChildSpec> {
        vec![self.bot_spec(), self.render_spec()]
    }
}

fn read_env_u32(key: &str) -> Option<u32> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn(format!("{}={:?} is not a number; using default", key, raw));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn render_spec_carries_port_workers_and_timeout() {
        let config = SupervisorConfig {
            port: 8080,
            render_workers: 1,
            render_timeout: Duration::from_secs(60),
        };
        let spec = config.render_spec();
        assert_eq!(spec.program, "gunicorn");
        assert_eq!(
            spec.args.join(" "),
            "--workers 1 --timeout 60 --bind 0.0.0.0:8080 render_server:app"
        );
    }

    #[test]
    fn bot_spec_runs_the_bot_script() {
        let config = SupervisorConfig {
            port: 5100,
            render_workers: 2,
            render_timeout: Duration::from_secs(30),
        };
        let spec = config.bot_spec();
        assert_eq!(spec.command_line(), "python3 bot.py");
    }

    #[test]
    fn child_specs_yield_exactly_two_children() {
        let config = SupervisorConfig {
            port: 5100,
            render_workers: 1,
            render_timeout: Duration::from_secs(60),
        };
        let specs = config.child_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "car-bot");
        assert_eq!(specs[1].name, "render-server");
    }

    #[test]
    fn command_line_with_no_args_is_just_the_program() {
        let spec = ChildSpec::new("solo", "sleep", Vec::new());
        assert_eq!(spec.command_line(), "sleep");
    }
}
