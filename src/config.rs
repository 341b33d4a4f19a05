//! Tunable knobs (§5 timeout table, §6.4 environment knobs). This is a
//! tunables struct, not the excluded CLI/configuration-loading subsystem —
//! no file formats, no CLI parsing.

use std::time::Duration;

/// Per-adapter/transport tunables, overridable via environment variables at
/// construction time (see [`Config::from_env`]).
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// `READER_THREAD_POLL_TIMEOUT`, default 10 000 ms.
    pub reader_poll_timeout: Duration,
    /// `COMMAND_STATUS_REPLY_TIMEOUT`, default 3 000 ms.
    pub cmd_status_timeout: Duration,
    /// `COMMAND_COMPLETE_REPLY_TIMEOUT`, default 10 000 ms.
    pub cmd_complete_timeout: Duration,
    /// `COMMAND_POLL_PERIOD`, default 125 ms.
    pub cmd_poll_period: Duration,
    /// `EVT_RING_CAPACITY`, default 64.
    pub evt_ring_capacity: usize,
    /// `HCI_READ_PACKET_MAX_RETRY`, defaults to `evt_ring_capacity`.
    pub read_packet_max_retry: usize,
    /// SMP pairing watchdog period. Not named explicitly in §6.4 but
    /// required by the watchdog described in §4.7.
    pub smp_watchdog_period: Duration,
    /// Ready-delay range used before GATT discovery (§4.10): `(pre_paired,
    /// freshly_paired)`.
    pub ready_delay: (Duration, Duration),
    /// Emit `debug!`/`trace!` spans on every HCI packet (`debug.hci.event`).
    pub debug_hci_event: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reader_poll_timeout: Duration::from_millis(10_000),
            cmd_status_timeout: Duration::from_millis(3_000),
            cmd_complete_timeout: Duration::from_millis(10_000),
            cmd_poll_period: Duration::from_millis(125),
            evt_ring_capacity: 64,
            read_packet_max_retry: 64,
            smp_watchdog_period: Duration::from_millis(5_000),
            ready_delay: (Duration::from_millis(100), Duration::from_millis(150)),
            debug_hci_event: false,
        }
    }
}

impl Config {
    /// Builds a [`Config`] starting from defaults and overriding each field
    /// present (and parseable) among the documented environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut c = Self::default();
        c.reader_poll_timeout = env_ms("hci.reader.timeout", c.reader_poll_timeout);
        c.cmd_status_timeout = env_ms("hci.cmd.status.timeout", c.cmd_status_timeout);
        c.cmd_complete_timeout = env_ms("hci.cmd.complete.timeout", c.cmd_complete_timeout);
        c.cmd_poll_period = env_ms("hci.cmd.poll.period", c.cmd_poll_period);
        c.evt_ring_capacity = env_parse("hci.ringsize", c.evt_ring_capacity);
        c.read_packet_max_retry = c.evt_ring_capacity;
        c.debug_hci_event = env_parse("debug.hci.event", c.debug_hci_event);
        c
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let c = Config::default();
        assert_eq!(c.reader_poll_timeout, Duration::from_millis(10_000));
        assert_eq!(c.cmd_status_timeout, Duration::from_millis(3_000));
        assert_eq!(c.cmd_complete_timeout, Duration::from_millis(10_000));
        assert_eq!(c.cmd_poll_period, Duration::from_millis(125));
        assert_eq!(c.evt_ring_capacity, 64);
    }
}
