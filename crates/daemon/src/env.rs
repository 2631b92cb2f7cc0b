// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon crate, grounded
//! in the teacher's `daemon/src/env.rs` pattern: one typed accessor per
//! knob, each with a sensible default, rather than scattered `env::var`
//! calls.

use std::time::Duration;

/// How long `RunningService::stop` waits for a service's endpoints to
/// finish before giving up on any still running (spec §6). Matches the Go
/// original's `SERVICE_STOP_TIMEOUT` default of 5 seconds.
pub fn service_stop_timeout() -> Duration {
    std::env::var("RECEPTOR_SERVICE_STOP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// How long `Lookup::cleanup` waits for each plugin process to exit after
/// being asked to stop, before it is treated as stuck.
pub fn plugin_stop_timeout() -> Duration {
    std::env::var("RECEPTOR_PLUGIN_STOP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial(receptor_env)]
    fn service_stop_timeout_defaults_to_five_seconds() {
        std::env::remove_var("RECEPTOR_SERVICE_STOP_TIMEOUT_MS");
        assert_eq!(service_stop_timeout(), Duration::from_secs(5));
    }

    #[test]
    #[serial(receptor_env)]
    fn service_stop_timeout_honors_override() {
        std::env::set_var("RECEPTOR_SERVICE_STOP_TIMEOUT_MS", "250");
        assert_eq!(service_stop_timeout(), Duration::from_millis(250));
        std::env::remove_var("RECEPTOR_SERVICE_STOP_TIMEOUT_MS");
    }
}
