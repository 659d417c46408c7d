//! The loader stack.

/// Initial capacity of a loader stack, in bytes.
const INITIAL_CAPACITY: usize = 64;

/// A growable byte stack for transient values within one type loader
/// invocation.
///
/// Values are pushed and popped as 8/16/32/64-bit quantities in native byte
/// order. The stack keeps no type tags; the instruction stream is solely
/// responsible for popping the width it pushed. Growth doubles capacity as
/// needed and the stack never shrinks during a parse.
#[derive(Debug, Default)]
pub struct LoaderStack {
    data: Vec<u8>,
}

macro_rules! push_pop {
    ($push:ident, $pop:ident, $ty:ty) => {
        pub fn $push(&mut self, val: $ty) {
            self.data.extend_from_slice(&val.to_ne_bytes());
        }

        /// Pop a value, or `None` on underflow.
        pub fn $pop(&mut self) -> Option<$ty> {
            let start = self.data.len().checked_sub(std::mem::size_of::<$ty>())?;
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(&self.data[start..]);
            self.data.truncate(start);
            Some(<$ty>::from_ne_bytes(raw))
        }
    };
}

impl LoaderStack {
    pub fn new() -> Self {
        LoaderStack {
            data: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Bytes currently in use.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    push_pop!(push_t8, pop_t8, u8);
    push_pop!(push_t16, pop_t16, u16);
    push_pop!(push_t32, pop_t32, u32);
    push_pop!(push_t64, pop_t64, u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trips() {
        let mut stack = LoaderStack::new();
        stack.push_t8(0xAB);
        stack.push_t16(0xCDEF);
        stack.push_t32(0x0123_4567);
        stack.push_t64(0x89AB_CDEF_0123_4567);
        assert_eq!(stack.pop_t64(), Some(0x89AB_CDEF_0123_4567));
        assert_eq!(stack.pop_t32(), Some(0x0123_4567));
        assert_eq!(stack.pop_t16(), Some(0xCDEF));
        assert_eq!(stack.pop_t8(), Some(0xAB));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_underflow_reported() {
        let mut stack = LoaderStack::new();
        assert_eq!(stack.pop_t8(), None);
        stack.push_t8(1);
        // one byte on the stack is not enough for a 16-bit pop
        assert_eq!(stack.pop_t16(), None);
        assert_eq!(stack.pop_t8(), Some(1));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut stack = LoaderStack::new();
        for i in 0..100u64 {
            stack.push_t64(i);
        }
        assert_eq!(stack.len(), 800);
        for i in (0..100u64).rev() {
            assert_eq!(stack.pop_t64(), Some(i));
        }
    }
}
