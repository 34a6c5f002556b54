// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Spinlock that masks local interrupts while held.
//!
//! A plain spinlock deadlocks if an interrupt handler tries to take a lock
//! the interrupted code already holds. `IrqMutex` saves the interrupt state,
//! masks interrupts, then spins; the guard releases the lock first and
//! restores the saved state last.

use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

/// Save/mask/restore of local interrupt state.
pub trait IrqControl: Sync {
    /// Mask local interrupts and return the previous state.
    fn save_and_disable(&self) -> usize;

    /// Restore a state returned by [`save_and_disable`](Self::save_and_disable).
    fn restore(&self, saved: usize);
}

/// Interrupt control for hosted builds, where there is nothing to mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIrq;

impl IrqControl for NoIrq {
    fn save_and_disable(&self) -> usize {
        0
    }

    fn restore(&self, _saved: usize) {}
}

/// aarch64 interrupt control through the DAIF register.
#[cfg(all(target_arch = "aarch64", target_os = "none"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct Daif;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
impl IrqControl for Daif {
    fn save_and_disable(&self) -> usize {
        let daif: u64;
        // SAFETY: DAIF is accessible at EL1; `msr daifset, #2` only sets the
        // IRQ mask bit and the old value is returned for restore.
        unsafe {
            core::arch::asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack));
            core::arch::asm!("msr daifset, #2", options(nomem, nostack));
        }
        daif as usize
    }

    fn restore(&self, saved: usize) {
        // SAFETY: writes back a value previously read from DAIF.
        unsafe {
            core::arch::asm!("msr daif, {}", in(reg) saved as u64, options(nomem, nostack));
        }
    }
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
const fn default_control() -> &'static dyn IrqControl {
    &Daif
}

#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
const fn default_control() -> &'static dyn IrqControl {
    &NoIrq
}

/// Mutex that masks local interrupts while locked.
///
/// # Example
/// ```
/// use xmbox_transport::IrqMutex;
///
/// let counter = IrqMutex::new(0u32);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct IrqMutex<T> {
    irq: &'static dyn IrqControl,
    inner: spin::Mutex<T>,
}

impl<T> IrqMutex<T> {
    /// Create a mutex using the target's default interrupt control.
    pub const fn new(value: T) -> Self {
        Self::with_control(value, default_control())
    }

    /// Create a mutex with explicit interrupt control.
    pub const fn with_control(value: T, irq: &'static dyn IrqControl) -> Self {
        Self {
            irq,
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquire the lock, masking interrupts until the guard is dropped.
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        let saved = self.irq.save_and_disable();
        let guard = self.inner.lock();
        IrqMutexGuard {
            guard: ManuallyDrop::new(guard),
            irq: self.irq,
            saved,
        }
    }

    /// Consume the mutex and return the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for IrqMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for IrqMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f.debug_struct("IrqMutex").field("data", &*guard).finish(),
            None => f.write_str("IrqMutex { <locked> }"),
        }
    }
}

/// Guard returned by [`IrqMutex::lock`].
///
/// Restores the saved interrupt state when dropped.
pub struct IrqMutexGuard<'a, T> {
    guard: ManuallyDrop<spin::MutexGuard<'a, T>>,
    irq: &'static dyn IrqControl,
    saved: usize,
}

impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for IrqMutexGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the guard is dropped exactly once, here, and never used after.
        unsafe { ManuallyDrop::drop(&mut self.guard) };
        self.irq.restore(self.saved);
    }
}
