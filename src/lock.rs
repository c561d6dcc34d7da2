/*!
    interrupt-safe access to state shared between interrupt handlers and the main loop

    A [IrqScope] masks interrupts for its lifetime and restores the previous interrupt state when dropped, whatever the exit path. An [IrqCell] can only be read or written while such a scope is alive.

    scopes must stay as narrow as possible: every instant spent inside one delays tap capture.
*/

use core::{
    cell::Cell,
    marker::PhantomData,
    };
use critical_section::{CriticalSection, Mutex, RestoreState};


/**
    token proving that interrupts are masked on the current core

    It restores exactly the interrupt state that was in effect at [Self::acquire] time, so nesting scopes inside an already masked region leaves interrupts masked when the inner scope ends.
*/
pub struct IrqScope {
    restore: RestoreState,
    // a scope is bound to the core and context that acquired it
    _local: PhantomData<*const ()>,
}
impl IrqScope {
    /// mask interrupts until the returned scope is dropped
    #[inline]
    pub fn acquire() -> Self {
        // SAFETY: released exactly once in Drop, and a scope cannot be sent elsewhere, so acquire/release pairs nest in the same context
        let restore = unsafe { critical_section::acquire() };
        Self {restore, _local: PhantomData}
    }
    /// critical section token borrowed from this scope
    #[inline]
    fn section(&self) -> CriticalSection<'_> {
        // SAFETY: the critical section is held as long as self lives
        unsafe { CriticalSection::new() }
    }
}
impl Drop for IrqScope {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: restore state comes from the matching acquire
        unsafe { critical_section::release(self.restore) }
    }
}

/// value shared with interrupt handlers, only accessible under an [IrqScope]
pub struct IrqCell<T> {
    value: Mutex<Cell<T>>,
}
impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {value: Mutex::new(Cell::new(value))}
    }
    pub fn set(&self, scope: &IrqScope, value: T) {
        self.value.borrow(scope.section()).set(value)
    }
    pub fn replace(&self, scope: &IrqScope, value: T) -> T {
        self.value.borrow(scope.section()).replace(value)
    }
    /// store a value in its own single-operation scope
    pub fn store(&self, value: T) {
        let scope = IrqScope::acquire();
        self.set(&scope, value)
    }
}
impl<T: Copy> IrqCell<T> {
    pub fn get(&self, scope: &IrqScope) -> T {
        self.value.borrow(scope.section()).get()
    }
    /// apply `change` to the current value and return the new one
    pub fn update(&self, scope: &IrqScope, change: impl FnOnce(T) -> T) -> T {
        let cell = self.value.borrow(scope.section());
        let new = change(cell.get());
        cell.set(new);
        new
    }
    /// read the value in its own single-operation scope
    pub fn load(&self) -> T {
        let scope = IrqScope::acquire();
        self.get(&scope)
    }
}
impl<T: Default> IrqCell<T> {
    pub fn take(&self, scope: &IrqScope) -> T {
        self.value.borrow(scope.section()).take()
    }
}
impl<T: Default> Default for IrqCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
impl<T: Copy + core::fmt::Debug> core::fmt::Debug for IrqCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("IrqCell").field(&self.load()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_restore_in_order() {
        let cell = IrqCell::new(1u32);
        let outer = IrqScope::acquire();
        {
            let inner = IrqScope::acquire();
            assert_eq!(cell.replace(&inner, 2), 1);
        }
        // still inside the outer scope
        assert_eq!(cell.get(&outer), 2);
        assert_eq!(cell.update(&outer, |v| v + 3), 5);
        drop(outer);
        assert_eq!(cell.load(), 5);
    }

    #[test]
    fn scope_released_on_early_return() {
        fn early(cell: &IrqCell<Option<u32>>) -> Option<u32> {
            let scope = IrqScope::acquire();
            let value = cell.take(&scope)?;
            Some(value * 2)
        }
        let cell = IrqCell::new(None);
        assert_eq!(early(&cell), None);
        // would deadlock with another thread if the scope leaked
        std::thread::spawn(|| drop(IrqScope::acquire())).join().unwrap();
        cell.store(Some(4));
        assert_eq!(early(&cell), Some(8));
        assert_eq!(cell.load(), None);
    }
}
