use std::collections::VecDeque;

use worldmap::Direction;

/// One validated tile-step command awaiting its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputMessage {
    pub sequence_number: u64,
    pub direction: Direction,
}

/// Outcome of validating an input against a player's acknowledged sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputVerdict {
    Accept,
    /// Sequence number zero; the first valid input of a session is 1.
    Malformed,
    /// No player record for the session (race with a leave).
    UnknownSession,
    /// Already at or behind the acknowledged sequence.
    Stale,
}

/// Shape and freshness check. Direction validity is enforced by the wire
/// decoder before an `InputMessage` can exist, so only the sequence remains.
pub fn validate(input: &InputMessage, last_processed: Option<u64>) -> InputVerdict {
    let Some(last) = last_processed else {
        return InputVerdict::UnknownSession;
    };
    if input.sequence_number == 0 {
        return InputVerdict::Malformed;
    }
    if input.sequence_number <= last {
        return InputVerdict::Stale;
    }
    InputVerdict::Accept
}

/// Bounded per-session FIFO. The tick consumes one entry from the head per
/// player; `push` refuses the newest entry once the cap is reached so a
/// flooding client cannot displace inputs already accepted.
#[derive(Debug)]
pub struct InputQueue {
    items: VecDeque<InputMessage>,
    cap: usize,
}

impl InputQueue {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append at the tail. Returns false (and drops the input) when full.
    pub fn push(&mut self, input: InputMessage) -> bool {
        if self.items.len() >= self.cap {
            return false;
        }
        self.items.push_back(input);
        true
    }

    pub fn pop(&mut self) -> Option<InputMessage> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
