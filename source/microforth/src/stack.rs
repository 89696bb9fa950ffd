/// A fixed-capacity stack over a caller-provided buffer.
///
/// The depth is the explicit top-of-stack index: slot `depth - 1` holds the
/// most recently pushed item.
pub struct Stack<'buf, T: Copy> {
    items: &'buf mut [T],
    depth: usize,
}

#[derive(Debug, PartialEq)]
pub enum StackError {
    StackEmpty,
    StackFull,
    OverwriteInvalid,
}

impl<'buf, T: Copy> Stack<'buf, T> {
    pub fn new(items: &'buf mut [T]) -> Self {
        Self { items, depth: 0 }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Moves the top-of-stack index. The slots that become visible keep
    /// whatever they held before.
    #[inline]
    pub fn set_depth(&mut self, depth: usize) -> Result<(), StackError> {
        if depth > self.items.len() {
            return Err(StackError::OverwriteInvalid);
        }
        self.depth = depth;
        Ok(())
    }

    #[inline]
    pub fn push(&mut self, item: T) -> Result<(), StackError> {
        if self.depth >= self.items.len() {
            return Err(StackError::StackFull);
        }
        self.items[self.depth] = item;
        self.depth += 1;
        Ok(())
    }

    #[inline]
    pub fn try_pop(&mut self) -> Result<T, StackError> {
        self.pop().ok_or(StackError::StackEmpty)
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let next = self.depth.checked_sub(1)?;
        let val = self.items[next];
        self.depth = next;
        Some(val)
    }

    #[inline]
    pub fn try_peek(&self) -> Result<T, StackError> {
        self.try_peek_back_n(0)
    }

    /// Returns the item `n` slots below the top, `0` being the top itself.
    #[inline]
    pub fn try_peek_back_n(&self, n: usize) -> Result<T, StackError> {
        if n >= self.depth {
            Err(StackError::StackEmpty)
        } else {
            Ok(self.items[self.depth - n - 1])
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.depth = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }
}

#[cfg(test)]
pub mod test {
    use super::{Stack, StackError};
    use crate::word::Cell;

    #[test]
    fn stack() {
        const ITEMS: usize = 16;
        let mut payload = [0 as Cell; ITEMS];

        let mut stack = Stack::<Cell>::new(&mut payload);

        for _ in 0..3 {
            for i in 0..(ITEMS as Cell) {
                assert!(stack.push(i).is_ok());
                assert_eq!(stack.try_peek(), Ok(i));
            }
            assert_eq!(stack.push(100), Err(StackError::StackFull));
            assert_eq!(stack.depth(), ITEMS);
            for i in (0..(ITEMS as Cell)).rev() {
                assert_eq!(stack.pop(), Some(i));
            }
            assert!(stack.pop().is_none());
            assert_eq!(stack.try_pop(), Err(StackError::StackEmpty));
        }
    }

    #[test]
    fn pick() {
        let mut payload = [0 as Cell; 4];
        let mut stack = Stack::<Cell>::new(&mut payload);
        assert_eq!(stack.try_peek_back_n(0), Err(StackError::StackEmpty));
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert_eq!(stack.try_peek_back_n(0), Ok(3));
        assert_eq!(stack.try_peek_back_n(2), Ok(1));
        assert_eq!(stack.try_peek_back_n(3), Err(StackError::StackEmpty));
        assert_eq!(stack.depth(), 3);
    }

    #[test]
    fn depth_is_settable() {
        let mut payload = [7 as Cell; 4];
        let mut stack = Stack::<Cell>::new(&mut payload);
        assert!(stack.is_empty());
        stack.set_depth(2).unwrap();
        assert_eq!(stack.try_pop(), Ok(7));
        assert_eq!(stack.set_depth(5), Err(StackError::OverwriteInvalid));
        stack.set_depth(4).unwrap();
        stack.clear();
        assert!(stack.is_empty());
    }
}
