//! Capabilities the driver consumes from the host real-time kernel.
//!
//! The driver never talks to a scheduler directly. Threads block on a
//! counting [`Semaphore`], interrupt routines wake them through
//! [`Semaphore::release_from_interrupt`], and the kernel decides whether the
//! interrupt epilogue must switch contexts. All of these services are
//! supplied by the integrator through the [`Kernel`] trait.

use core::ptr::NonNull;

/// A non-reentrant blocking mutex.
pub trait Mutex: Sync {
    /// Blocks until the mutex is acquired.
    fn lock(&self);

    /// Releases the mutex.
    fn unlock(&self);
}

/// Scoped mutex acquisition.
pub struct MutexGuard<'a, M: Mutex> {
    mutex: &'a M,
}

impl<'a, M: Mutex> MutexGuard<'a, M> {
    pub fn new(mutex: &'a M) -> Self {
        mutex.lock();
        Self { mutex }
    }
}

impl<M: Mutex> Drop for MutexGuard<'_, M> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

/// A counting semaphore shared between threads and interrupt routines.
pub trait Semaphore: Sync {
    /// Takes one permit, blocking until one is available.
    ///
    /// Returns `false` when the wait was cancelled by the kernel; no permit
    /// is consumed in that case.
    fn acquire(&self) -> bool;

    /// Returns one permit from interrupt context.
    ///
    /// Returns `true` when a waiting thread became ready.
    fn release_from_interrupt(&self) -> bool;

    /// Whether the readied thread outranks the interrupted one, so the
    /// interrupt epilogue should request a context switch.
    fn has_to_switch_context(&self) -> bool;
}

/// A registered interrupt vector. Dropping the handle unregisters it.
pub trait InterruptHandle {
    fn enable(&self);
    fn disable(&self);
}

/// The body of an interrupt routine.
pub trait Runnable {
    fn run(&self);
}

/// The interrupt vectors of one bxCAN controller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqVector {
    /// Transmit mailbox empty (RQCP latched).
    Tx,
    /// RX FIFO 0 message pending.
    Rx0,
    /// RX FIFO 1 message pending.
    Rx1,
    /// Status change / error.
    Sce,
}

impl IrqVector {
    /// NVIC interrupt number on STM32F103 parts.
    pub const fn number(self) -> u16 {
        match self {
            IrqVector::Tx => 19,
            IrqVector::Rx0 => 20,
            IrqVector::Rx1 => 21,
            IrqVector::Sce => 22,
        }
    }
}

/// A routine bound to its owning component at registration time.
///
/// The interrupt controller stores the routine in its dispatch table and
/// invokes it through [`Routine::run`] whenever the vector fires.
#[derive(Clone, Copy)]
pub struct Routine {
    context: NonNull<()>,
    run: unsafe fn(NonNull<()>),
}

// Routines are handed to the interrupt controller, which runs them from
// interrupt context; the bound state is required to be `Sync`.
unsafe impl Send for Routine {}
unsafe impl Sync for Routine {}

impl Routine {
    /// Binds the routine to `context`.
    pub fn new<T: Runnable + Sync>(context: &T) -> Self {
        unsafe fn trampoline<T: Runnable>(context: NonNull<()>) {
            unsafe { context.cast::<T>().as_ref() }.run();
        }

        Self {
            context: NonNull::from(context).cast(),
            run: trampoline::<T>,
        }
    }

    /// Invokes the routine.
    ///
    /// # Safety
    ///
    /// The context the routine was bound to must still be alive. The driver
    /// guarantees this by dropping interrupt handles before the state they
    /// point into.
    pub unsafe fn run(&self) {
        unsafe { (self.run)(self.context) }
    }
}

/// The bundle of kernel services the driver is built on.
pub trait Kernel: Sync {
    type Mutex: Mutex;
    type Semaphore: Semaphore;
    type Interrupt: InterruptHandle;

    /// Allocates a mutex.
    fn create_mutex(&self) -> Option<Self::Mutex>;

    /// Allocates a counting semaphore with `initial` permits and a ceiling
    /// of `maximum`.
    fn create_semaphore(&self, initial: u32, maximum: u32) -> Option<Self::Semaphore>;

    /// Registers `routine` on `vector` and returns the controlling handle.
    ///
    /// # Safety
    ///
    /// The caller must keep the state `routine` is bound to alive until the
    /// returned handle is dropped.
    unsafe fn create_interrupt(
        &self,
        routine: Routine,
        vector: IrqVector,
    ) -> Option<Self::Interrupt>;

    /// Requests a context switch from an interrupt epilogue.
    fn yield_from_interrupt(&self);

    /// The CPU core clock in Hz.
    fn cpu_clock_hz(&self) -> u32;
}
