//! Solver buffers with guard regions on both sides.

/// Bit pattern written into every canary slot.
///
/// A signalling-free NaN payload no arithmetic produces, compared by bits.
pub const CANARY_BITS: u64 = 0x7ff8_dead_beef_0001;

/// The canary value.
pub fn canary() -> f64 {
    f64::from_bits(CANARY_BITS)
}

fn is_canary(v: f64) -> bool {
    v.to_bits() == CANARY_BITS
}

/// A `len`-element buffer surrounded by `guard` canary slots on each side.
///
/// Hand [`as_ptr`](Self::as_ptr) / [`as_mut_ptr`](Self::as_mut_ptr) to the
/// code under test, then check [`guards_intact`](Self::guards_intact).
#[derive(Clone, Debug)]
pub struct CanaryBuffer {
    storage: Vec<f64>,
    len: usize,
    guard: usize,
}

impl CanaryBuffer {
    /// Guard width used by [`new`](Self::new).
    pub const DEFAULT_GUARD: usize = 4;

    /// An output buffer whose payload is all canaries.
    pub fn new(len: usize) -> Self {
        Self::with_guard(len, Self::DEFAULT_GUARD)
    }

    pub fn with_guard(len: usize, guard: usize) -> Self {
        Self {
            storage: vec![canary(); len + 2 * guard],
            len,
            guard,
        }
    }

    /// An input buffer holding `values`.
    pub fn filled(values: &[f64]) -> Self {
        let mut buf = Self::new(values.len());
        buf.payload_mut().copy_from_slice(values);
        buf
    }

    pub fn as_ptr(&self) -> *const f64 {
        self.payload().as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut f64 {
        self.payload_mut().as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> &[f64] {
        &self.storage[self.guard..self.guard + self.len]
    }

    pub fn payload_mut(&mut self) -> &mut [f64] {
        &mut self.storage[self.guard..self.guard + self.len]
    }

    /// Returns `true` if nothing was written outside the payload.
    pub fn guards_intact(&self) -> bool {
        let (head, rest) = self.storage.split_at(self.guard);
        let tail = &rest[self.len..];
        head.iter().chain(tail).all(|v| is_canary(*v))
    }

    /// Returns `true` if the payload was never written.
    pub fn untouched(&self) -> bool {
        self.payload().iter().all(|v| is_canary(*v))
    }

    /// Number of leading payload slots that were written.
    pub fn written_prefix(&self) -> usize {
        self.payload().iter().take_while(|v| !is_canary(**v)).count()
    }
}
