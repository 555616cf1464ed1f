//! A raw `pthread_mutex_t`-backed recursive mutex.
//!
//! The process-wide lock serializing the entire rewrite path (spec §5) must
//! be recursive: a wrapper's own fallback path may call back into another
//! interposed entry point on the same thread (e.g. the `dlopen` wrapper's
//! dependency walk opens files through `open`). A non-recursive mutex would
//! deadlock that thread against itself.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct RecursiveMutex<T> {
    inner: UnsafeCell<libc::pthread_mutex_t>,
    data: UnsafeCell<T>,
    initialized: AtomicBool,
    init_lock: AtomicBool,
}

unsafe impl<T: Send> Send for RecursiveMutex<T> {}
unsafe impl<T: Send> Sync for RecursiveMutex<T> {}

impl<T> RecursiveMutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            inner: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
            data: UnsafeCell::new(data),
            initialized: AtomicBool::new(false),
            init_lock: AtomicBool::new(false),
        }
    }

    /// One-time initialization of the underlying mutex as recursive. Safe
    /// to call from any number of racing threads; only the winner of the
    /// spinlock actually runs `pthread_mutex_init`.
    fn ensure_init(&self) {
        if self.initialized.load(Ordering::Acquire) {
            return;
        }
        while self
            .init_lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
        if !self.initialized.load(Ordering::Acquire) {
            unsafe {
                let mut attr: libc::pthread_mutexattr_t = std::mem::zeroed();
                libc::pthread_mutexattr_init(&mut attr);
                libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_RECURSIVE);
                libc::pthread_mutex_init(self.inner.get(), &attr);
                libc::pthread_mutexattr_destroy(&mut attr);
            }
            self.initialized.store(true, Ordering::Release);
        }
        self.init_lock.store(false, Ordering::Release);
    }

    pub fn lock(&self) -> RecursiveMutexGuard<'_, T> {
        self.ensure_init();
        unsafe {
            libc::pthread_mutex_lock(self.inner.get());
        }
        RecursiveMutexGuard { mutex: self }
    }

    /// Explicitly destroys the underlying `pthread_mutex_t`. Needed because
    /// the process-wide state this mutex lives in is allocated via `mmap`
    /// and leaked for the process lifetime (spec §3: "the mutex is created
    /// in the constructor and destroyed in the destructor") — ordinary
    /// `Drop` never runs on it, so the library's `__DATA,__mod_term_func`
    /// finalizer calls this directly instead.
    ///
    /// # Safety
    /// Must not be called while any thread might still be holding or about
    /// to acquire this lock.
    pub unsafe fn destroy(&self) {
        if self.initialized.swap(false, Ordering::AcqRel) {
            libc::pthread_mutex_destroy(self.inner.get());
        }
    }
}

impl<T> Drop for RecursiveMutex<T> {
    fn drop(&mut self) {
        if self.initialized.load(Ordering::Acquire) {
            unsafe {
                libc::pthread_mutex_destroy(self.inner.get());
            }
        }
    }
}

pub struct RecursiveMutexGuard<'a, T> {
    mutex: &'a RecursiveMutex<T>,
}

impl<'a, T> std::ops::Deref for RecursiveMutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> std::ops::DerefMut for RecursiveMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for RecursiveMutexGuard<'a, T> {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_unlock(self.mutex.inner.get());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_excludes_concurrent_writers() {
        let mutex = Arc::new(RecursiveMutex::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&mutex);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = m.lock();
                    *guard += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*mutex.lock(), 8000);
    }

    #[test]
    fn lock_is_reentrant_on_same_thread() {
        let mutex = RecursiveMutex::new(0u64);
        let outer = mutex.lock();
        // A second lock() call from the same thread must not deadlock.
        let inner = mutex.lock();
        assert_eq!(*inner, 0);
        drop(inner);
        drop(outer);
    }
}
