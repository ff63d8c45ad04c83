//! Per-engine counters
//!
//! Each engine owns its counters; [`Gateway::metrics`](crate::Gateway::metrics)
//! copies them into one [`MetricsSnapshot`].

/// Host link counters
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HostLinkStats {
    /// Checksum-valid frames dispatched
    pub frames_received: u64,
    /// Frames written to the host, replies and unsolicited
    pub frames_sent: u64,
    /// Unsolicited frames among `frames_sent`
    pub unsolicited_sent: u64,
    /// Bytes discarded while resynchronizing
    pub bytes_dropped: u64,
    /// Error replies sent
    pub error_replies: u64,
    /// Writes the transport rejected
    pub send_failures: u64,
}

/// XpressNet master counters
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XpressNetStats {
    /// Normal inquiry calls sent
    pub inquiries_sent: u64,
    /// Messages with payload sent
    pub messages_sent: u64,
    /// Checksum-valid frames received
    pub frames_received: u64,
    /// Frames discarded on checksum mismatch
    pub checksum_errors: u64,
    /// Throttle events decoded
    pub throttle_events: u64,
    /// Requests answered as unsupported
    pub unsupported_requests: u64,
    /// Port or driver-enable failures during a step
    pub hal_faults: u64,
}

/// S88 scanner counters
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct S88Stats {
    /// Completed scan cycles
    pub scan_cycles: u64,
    /// Input bits read
    pub bits_read: u64,
    /// Cycles that ended before every input was read
    pub truncated_cycles: u64,
    /// Line or shift-engine failures during a step
    pub hal_faults: u64,
}

/// Snapshot of every engine's counters
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Host link
    pub host: HostLinkStats,
    /// XpressNet master
    pub xpressnet: XpressNetStats,
    /// S88 scanner
    pub s88: S88Stats,
}

impl MetricsSnapshot {
    /// Sum of every recovered fault counter.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.host.error_replies
            + self.host.send_failures
            + self.xpressnet.checksum_errors
            + self.xpressnet.hal_faults
            + self.s88.truncated_cycles
            + self.s88.hal_faults
    }

    /// Average bits read per completed S88 cycle.
    #[must_use]
    pub fn avg_bits_per_cycle(&self) -> Option<u64> {
        average(self.s88.bits_read, self.s88.scan_cycles)
    }
}

fn average(total: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    Some(total / count)
}
