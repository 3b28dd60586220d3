//! Slot feeders
//!
//! The machine's slot feeders are advanced by a solenoid per slot. Slots are
//! named by bank and number: `F07` is front slot 7, `R13` is rear slot 13.
//! Rear slots occupy controller indices from 32 up.

use parking_lot::Mutex;
use tvmkit_core::{ControllerError, Result};
use tvmkit_settings::FeedPolicy;

/// Controller index of the first rear slot
pub const REAR_BASE: usize = 32;

/// Something that can fire and release feeder solenoids
pub trait FeederBank {
    /// Fire one feeder
    fn feeder_open(&self, index: usize) -> Result<()>;

    /// Release every feeder
    fn feeders_close_all(&self) -> Result<()>;
}

/// Controller index of a slot name such as `F07` or `R13`
pub fn slot_index(slot: &str) -> Result<usize> {
    let invalid = || {
        ControllerError::invalid_argument(format!(
            "feeder slot {:?} is not F or R followed by two digits",
            slot
        ))
    };

    let mut chars = slot.chars();
    let base = match chars.next() {
        Some('F') => 0,
        Some('R') => REAR_BASE,
        _ => return Err(invalid().into()),
    };
    let digits = chars.as_str();
    if digits.len() != 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid().into());
    }
    let number: usize = digits.parse().map_err(|_| invalid())?;
    Ok(base + number)
}

/// Feed bookkeeping across all slots
#[derive(Debug, Default)]
pub struct FeederSlots {
    policy: FeedPolicy,
    last_open: Mutex<Option<usize>>,
}

impl FeederSlots {
    /// Slots driven with `policy`
    pub fn new(policy: FeedPolicy) -> Self {
        Self {
            policy,
            last_open: Mutex::new(None),
        }
    }

    /// Policy in use
    pub fn policy(&self) -> FeedPolicy {
        self.policy
    }

    /// Feeder currently held open, if known
    pub fn last_open(&self) -> Option<usize> {
        *self.last_open.lock()
    }

    /// Advance the feeder in `slot`
    pub fn feed(&self, slot: &str, bank: &dyn FeederBank) -> Result<()> {
        let index = slot_index(slot)?;
        let mut last_open = self.last_open.lock();

        match self.policy {
            FeedPolicy::PushPush if *last_open == Some(index) => {
                tracing::debug!("Feeder {} already open, closing", slot);
                bank.feeders_close_all()?;
                *last_open = None;
            }
            FeedPolicy::PushPush => {
                bank.feeder_open(index)?;
                *last_open = Some(index);
            }
            FeedPolicy::CloseThenOpen => {
                bank.feeders_close_all()?;
                bank.feeder_open(index)?;
                *last_open = Some(index);
            }
        }
        Ok(())
    }

    /// Release every feeder once the part has been picked
    pub fn post_pick(&self, bank: &dyn FeederBank) -> Result<()> {
        let mut last_open = self.last_open.lock();
        bank.feeders_close_all()?;
        *last_open = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingBank {
        calls: RefCell<Vec<String>>,
    }

    impl FeederBank for RecordingBank {
        fn feeder_open(&self, index: usize) -> Result<()> {
            self.calls.borrow_mut().push(format!("open {}", index));
            Ok(())
        }

        fn feeders_close_all(&self) -> Result<()> {
            self.calls.borrow_mut().push("close".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_slot_names() {
        assert_eq!(slot_index("F07").unwrap(), 7);
        assert_eq!(slot_index("R13").unwrap(), 45);
        assert_eq!(slot_index("F00").unwrap(), 0);
        for bad in ["", "F7", "X07", "F0A", "R123"] {
            assert!(slot_index(bad).unwrap_err().is_invalid_argument(), "{}", bad);
        }
    }

    #[test]
    fn test_push_push_toggles() {
        let bank = RecordingBank::default();
        let slots = FeederSlots::new(FeedPolicy::PushPush);

        slots.feed("F05", &bank).unwrap();
        slots.feed("F05", &bank).unwrap();
        slots.feed("F05", &bank).unwrap();
        slots.feed("F06", &bank).unwrap();
        assert_eq!(
            *bank.calls.borrow(),
            vec!["open 5", "close", "open 5", "open 6"]
        );
        assert_eq!(slots.last_open(), Some(6));

        slots.post_pick(&bank).unwrap();
        assert_eq!(slots.last_open(), None);
    }

    #[test]
    fn test_close_then_open_always_feeds() {
        let bank = RecordingBank::default();
        let slots = FeederSlots::new(FeedPolicy::CloseThenOpen);

        slots.feed("F05", &bank).unwrap();
        slots.feed("F05", &bank).unwrap();
        assert_eq!(
            *bank.calls.borrow(),
            vec!["close", "open 5", "close", "open 5"]
        );
    }
}
