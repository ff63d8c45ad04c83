//! Shared feedback input table
//!
//! Bus engines write scan results here; the host link drains the resulting
//! change notifications. Addresses are 1-based per channel.

use std::collections::VecDeque;

use tracing::trace;

use crate::protocol::{InputChannel, InputState};
use crate::s88;

/// Number of S88 inputs the table can hold.
pub const S88_CAPACITY: usize = s88::MODULE_COUNT_MAX as usize * s88::INPUTS_PER_MODULE;

/// A genuine state transition recorded by [`InputRegistry::update_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputChange {
    /// Input channel
    pub channel: InputChannel,
    /// 1-based input address
    pub address: u16,
    /// New state
    pub state: InputState,
}

/// Input state table with change tracking
#[derive(Debug)]
pub struct InputRegistry {
    s88: Vec<InputState>,
    changes: VecDeque<InputChange>,
}

impl InputRegistry {
    /// Create a registry with every input `Unknown`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            s88: vec![InputState::Unknown; S88_CAPACITY],
            changes: VecDeque::new(),
        }
    }

    fn states(&self, channel: InputChannel) -> &[InputState] {
        match channel {
            InputChannel::S88 => &self.s88,
            InputChannel::LocoNet | InputChannel::XpressNet => &[],
        }
    }

    fn states_mut(&mut self, channel: InputChannel) -> &mut [InputState] {
        match channel {
            InputChannel::S88 => &mut self.s88,
            InputChannel::LocoNet | InputChannel::XpressNet => &mut [],
        }
    }

    /// Number of addressable inputs on `channel`.
    #[must_use]
    pub fn capacity(&self, channel: InputChannel) -> usize {
        self.states(channel).len()
    }

    /// Record a scanned state.
    ///
    /// Out-of-range addresses are ignored. Only a change from the stored
    /// state is written and queued as a notification; returns whether that
    /// happened.
    pub fn update_state(&mut self, channel: InputChannel, address: u16, state: InputState) -> bool {
        let Some(index) = usize::from(address).checked_sub(1) else {
            return false;
        };
        let Some(slot) = self.states_mut(channel).get_mut(index) else {
            return false;
        };
        if *slot == state {
            return false;
        }

        *slot = state;
        trace!(%channel, address, ?state, "input changed");
        self.changes.push_back(InputChange {
            channel,
            address,
            state,
        });
        true
    }

    /// Look up a stored state; `None` when the address is out of range.
    #[must_use]
    pub fn get_state(&self, channel: InputChannel, address: u16) -> Option<InputState> {
        let index = usize::from(address).checked_sub(1)?;
        self.states(channel).get(index).copied()
    }

    /// Set every input of `channel` back to `Unknown`.
    ///
    /// Pending notifications for the channel are discarded.
    pub fn reset(&mut self, channel: InputChannel) {
        self.states_mut(channel).fill(InputState::Unknown);
        self.changes.retain(|change| change.channel != channel);
    }

    /// Pop the oldest pending change notification.
    pub fn take_change(&mut self) -> Option<InputChange> {
        self.changes.pop_front()
    }

    /// Number of notifications not yet taken.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }
}

impl Default for InputRegistry {
    fn default() -> Self {
        Self::new()
    }
}
