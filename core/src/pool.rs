//! Allocation-preserving container for frame-rebuilt data.
//!
//! Per-frame structures (the collected view list, recorded command streams)
//! are emptied and refilled every frame. Holding them in an `Option<T>` and
//! setting `None` between frames throws the heap allocations away; [`Pooled<T>`]
//! instead parks the cleared value so the next frame reuses its capacity.

/// Types that can be emptied in place while keeping their allocations.
pub trait Poolable {
    /// Create an empty instance (no allocation expected).
    fn new_empty() -> Self;

    /// Clear contents but keep capacity, e.g. `Vec::clear`.
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    fn new_empty() -> Self {
        Vec::new()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

/// A value that alternates between an in-use state and a parked state.
///
/// While `Active` the value holds live frame data; `release` clears it via
/// [`Poolable::reset`] and parks it, and `activate` hands the cleared value
/// back out for refilling. The allocation survives the round trip.
#[derive(Debug)]
pub enum Pooled<T: Poolable> {
    /// Holds live data.
    Active(T),
    /// Cleared, capacity retained.
    Parked(T),
}

impl<T: Poolable> Pooled<T> {
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Clear the value and park it. No-op when already parked.
    pub fn release(&mut self) {
        if let Self::Active(value) = self {
            value.reset();
            let cleared = std::mem::replace(value, T::new_empty());
            *self = Self::Parked(cleared);
        }
    }

    /// Bring the value into the active state and return it for refilling.
    ///
    /// A parked value comes back cleared but with its capacity intact; an
    /// already-active value is returned as is.
    pub fn activate(&mut self) -> &mut T {
        if let Self::Parked(value) = self {
            let held = std::mem::replace(value, T::new_empty());
            *self = Self::Active(held);
        }
        match self {
            Self::Active(value) => value,
            Self::Parked(_) => unreachable!(),
        }
    }

    /// Reference to the inner value regardless of state.
    pub fn inner(&self) -> &T {
        match self {
            Self::Active(value) | Self::Parked(value) => value,
        }
    }
}

impl<T: Poolable> Default for Pooled<T> {
    fn default() -> Self {
        Self::Parked(T::new_empty())
    }
}
