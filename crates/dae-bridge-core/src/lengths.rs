//! The solver's integer parameter vector (`ipar`).

use smallvec::SmallVec;

use crate::error::BridgeError;

/// `ipar` index holding the state-vector length N.
pub const STATE_LEN_INDEX: usize = 0;
/// `ipar` index holding the event count M.
pub const EVENT_COUNT_INDEX: usize = 1;

/// Copy of the leading `ipar` entries for one invocation.
///
/// Set by the solver driver before the solve begins. The bridge reads it
/// fresh on every call and never caches a length across calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LengthParameters {
    values: SmallVec<[i32; 4]>,
}

impl LengthParameters {
    /// Copy `ipar` entries.
    pub fn from_slice(ipar: &[i32]) -> Self {
        Self {
            values: SmallVec::from_slice(ipar),
        }
    }

    /// Raw entries.
    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    /// State-vector length N (`ipar[0]`). Must be at least 1.
    pub fn state_len(&self) -> Result<usize, BridgeError> {
        match self.get(STATE_LEN_INDEX)? {
            0 => Err(BridgeError::InvalidLengthParameter {
                index: STATE_LEN_INDEX,
                value: 0,
            }),
            n => Ok(n),
        }
    }

    /// Event count M (`ipar[1]`). Zero is allowed.
    pub fn event_count(&self) -> Result<usize, BridgeError> {
        self.get(EVENT_COUNT_INDEX)
    }

    fn get(&self, index: usize) -> Result<usize, BridgeError> {
        let raw = *self
            .values
            .get(index)
            .ok_or(BridgeError::MissingLengthParameter { index })?;
        usize::try_from(raw).map_err(|_| BridgeError::InvalidLengthParameter {
            index,
            value: i64::from(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_state_len_and_event_count() {
        let p = LengthParameters::from_slice(&[5, 2]);
        assert_eq!(p.state_len(), Ok(5));
        assert_eq!(p.event_count(), Ok(2));
    }

    #[test]
    fn zero_state_len_is_invalid() {
        let p = LengthParameters::from_slice(&[0]);
        assert_eq!(
            p.state_len(),
            Err(BridgeError::InvalidLengthParameter { index: 0, value: 0 })
        );
    }

    #[test]
    fn negative_entries_are_invalid() {
        let p = LengthParameters::from_slice(&[3, -1]);
        assert_eq!(
            p.event_count(),
            Err(BridgeError::InvalidLengthParameter {
                index: 1,
                value: -1
            })
        );
    }

    #[test]
    fn event_count_missing_from_residual_ipar() {
        let p = LengthParameters::from_slice(&[3]);
        assert_eq!(
            p.event_count(),
            Err(BridgeError::MissingLengthParameter { index: 1 })
        );
    }

    #[test]
    fn zero_events_allowed() {
        assert_eq!(LengthParameters::from_slice(&[3, 0]).event_count(), Ok(0));
    }
}
