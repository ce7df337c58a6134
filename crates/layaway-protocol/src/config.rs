use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    pub sign_timeout: Duration,
    pub finality_timeout: Duration,
    pub sequencer_timeout: Duration,
    pub session_buffer: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            sign_timeout: Duration::from_secs(30),
            finality_timeout: Duration::from_secs(30),
            sequencer_timeout: Duration::from_secs(10),
            session_buffer: 16,
        }
    }
}

impl ProtocolConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            sign_timeout: env_duration("LAYAWAY_SIGN_TIMEOUT_MS", defaults.sign_timeout)?,
            finality_timeout: env_duration("LAYAWAY_FINALITY_TIMEOUT_MS", defaults.finality_timeout)?,
            sequencer_timeout: env_duration(
                "LAYAWAY_SEQUENCER_TIMEOUT_MS",
                defaults.sequencer_timeout,
            )?,
            session_buffer: defaults.session_buffer,
        })
    }
}

fn env_duration(name: &str, fallback: Duration) -> Result<Duration> {
    match std::env::var(name) {
        Ok(raw) => {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{name} must be a millisecond count"))?;
            Ok(Duration::from_millis(millis))
        }
        Err(_) => Ok(fallback),
    }
}
