use crate::error::{Error, Result};

/// Tagged storage for the outcome of an asynchronous unit.
///
/// A cell is written exactly once, from `Empty` to either `Value` or
/// `Error`. Errors are replayed on every read; a value can be borrowed any
/// number of times and moved out once, after which the cell is `Consumed`.
///
/// Reading a cell that was never written is a programmer error and panics.
#[derive(Debug)]
pub(crate) enum ResultCell<T> {
    /// No outcome has been stored yet.
    Empty,

    /// The unit completed with a value.
    Value(T),

    /// The unit failed; the error is replayed on every read.
    Error(Error),

    /// The value was moved out by its single consumer.
    Consumed,
}

impl<T> ResultCell<T> {
    /// Creates an empty cell.
    pub(crate) const fn new() -> Self {
        Self::Empty
    }

    /// Returns `true` while no outcome has been stored.
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Stores the outcome of the unit.
    ///
    /// # Panics
    ///
    /// Panics if an outcome was already stored.
    pub(crate) fn complete(&mut self, outcome: Result<T>) {
        assert!(self.is_empty(), "result cell written twice");

        *self = match outcome {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Error(error),
        };
    }

    /// Borrows the stored value or replays the stored error.
    ///
    /// # Panics
    ///
    /// Panics if the cell is still empty or its value was already moved out.
    pub(crate) fn get(&self) -> Result<&T> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(error) => Err(error.clone()),
            Self::Empty => panic!("result read before it was written"),
            Self::Consumed => panic!("result already taken"),
        }
    }

    /// Moves the stored value out, or replays the stored error.
    ///
    /// # Panics
    ///
    /// Panics if the cell is still empty or its value was already moved out.
    pub(crate) fn take(&mut self) -> Result<T> {
        match std::mem::replace(self, Self::Consumed) {
            Self::Value(value) => Ok(value),
            Self::Error(error) => {
                *self = Self::Error(error.clone());
                Err(error)
            }
            Self::Empty => panic!("result read before it was written"),
            Self::Consumed => panic!("result already taken"),
        }
    }
}

impl<T> Default for ResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
