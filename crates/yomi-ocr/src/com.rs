use anyhow::{Context, Result};
use windows::Win32::System::Com::{COINIT_MULTITHREADED, CoInitializeEx, CoUninitialize};

/// Keeps COM initialized (MTA) on the current thread while alive
///
/// WinRT OCR calls come from the OCR worker thread, which never initializes
/// COM itself, so each recognition holds one of these.
pub struct ComGuard;

impl ComGuard {
    pub fn initialize() -> Result<Self> {
        unsafe {
            CoInitializeEx(Some(std::ptr::null()), COINIT_MULTITHREADED)
                .ok()
                .context("Failed to initialize COM")?;
        }
        Ok(ComGuard)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
