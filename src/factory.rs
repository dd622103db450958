//! Process-wide arbitration of controller construction.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::controller::CanResource;
use crate::kernel::Kernel;
use crate::pac::Peripherals;
use crate::{Can, Config, Number};

/// Produces configured [`Can`] controllers and owns their register memory.
///
/// At most one controller may be live per controller number; the slot is
/// released again when the returned handle is dropped.
pub struct CanFactory<'k, K: Kernel> {
    kernel: &'k K,
    periph: Peripherals,
    mutex: K::Mutex,
    live: [AtomicBool; 2],
    slot: UnsafeCell<Option<CanResource<'k, K>>>,
}

// The slot is only written by the thread that won the `live` claim for its
// controller number; the claim's release-store publishes the writes before
// another thread can acquire the slot.
unsafe impl<K: Kernel> Send for CanFactory<'_, K> {}
unsafe impl<K: Kernel> Sync for CanFactory<'_, K> {}

impl<'k, K: Kernel> CanFactory<'k, K> {
    /// Binds the factory to the kernel and the register memory.
    ///
    /// Returns `None` when the shared init/deinit mutex cannot be created.
    pub fn new(kernel: &'k K, periph: Peripherals) -> Option<Self> {
        let mutex = kernel.create_mutex()?;
        Some(Self {
            kernel,
            periph,
            mutex,
            live: [AtomicBool::new(false), AtomicBool::new(false)],
            slot: UnsafeCell::new(None),
        })
    }

    /// Creates the controller described by `config`.
    ///
    /// Returns `None` when the configuration is invalid, the controller
    /// number is already taken, or the hardware handshake fails. A failed
    /// construction leaves neither hardware nor factory state behind.
    pub fn create(&self, config: Config) -> Option<Can<'_, 'k, K>> {
        if config.number != Number::Can1 {
            return None;
        }
        let number = config.number as usize;

        // Fail fast instead of blocking when the slot is contested.
        if self.live[number]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let resource = match CanResource::new(self.kernel, config, self.periph.duplicate()) {
            Some(resource) => resource,
            None => {
                self.live[number].store(false, Ordering::Release);
                return None;
            }
        };

        // Pin the resource in the slot before interrupt routines bind to it.
        unsafe {
            *self.slot.get() = Some(resource);
        }
        let activated = match unsafe { (*self.slot.get()).as_mut() } {
            Some(resource) => unsafe { resource.activate(&self.mutex) },
            None => false,
        };
        if !activated {
            unsafe {
                *self.slot.get() = None;
            }
            self.live[number].store(false, Ordering::Release);
            return None;
        }

        Some(Can::bind(self))
    }

    pub(crate) fn resource(&self) -> Option<&CanResource<'k, K>> {
        unsafe { (*self.slot.get()).as_ref() }
    }

    /// Tears the live controller down and releases its number.
    pub(crate) fn destroy(&self) {
        unsafe {
            if let Some(resource) = (*self.slot.get()).as_ref() {
                resource.deinitialize(&self.mutex);
            }
            *self.slot.get() = None;
        }
        self.live[Number::Can1 as usize].store(false, Ordering::Release);
    }
}
