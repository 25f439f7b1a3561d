//! Result Copy-Back into the solver-owned output buffer.

use crate::error::BridgeError;

/// Copy exactly `expected` doubles from `result` into `destination`.
///
/// A result shorter than `expected` is a [`BridgeError::LengthMismatch`];
/// extra trailing elements are ignored. Nothing is written unless the
/// whole copy can happen, so a failed copy leaves `destination` untouched.
pub fn copy_out(result: &[f64], destination: &mut [f64], expected: usize) -> Result<(), BridgeError> {
    if result.len() < expected {
        return Err(BridgeError::LengthMismatch {
            expected,
            found: result.len(),
        });
    }
    if destination.len() < expected {
        return Err(BridgeError::BufferTooShort {
            buffer: "res",
            expected,
            found: destination.len(),
        });
    }
    destination[..expected].copy_from_slice(&result[..expected]);
    Ok(())
}
