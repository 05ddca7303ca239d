use std::thread::{self, ThreadId};

use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// Membership of the calling thread in the multithreaded COM apartment.
///
/// While any thread holds one, every other thread of the process may use
/// MTA objects through the implicit MTA. Must be dropped on the thread that
/// created it, after every COM object it covers has been released.
pub(crate) struct ComApartment {
    thread: ThreadId,
}

impl ComApartment {
    pub fn enter() -> windows::core::Result<Self> {
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED).ok()? };
        Ok(Self {
            thread: thread::current().id(),
        })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if thread::current().id() != self.thread {
            log::warn!("COM apartment released on a foreign thread; leaving it initialized");
            return;
        }
        unsafe {
            CoUninitialize();
        }
    }
}
