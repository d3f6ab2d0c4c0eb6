//! Administrator check

/// Whether the current process runs elevated
///
/// Editing the hosts file and running `winws.exe` both need it.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::mem;
    use std::ptr;
    use winapi::shared::minwindef::{DWORD, LPVOID};
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{GetCurrentProcess, OpenProcessToken};
    use winapi::um::securitybaseapi::GetTokenInformation;
    use winapi::um::winnt::{TokenElevation, HANDLE, TOKEN_ELEVATION, TOKEN_QUERY};

    // SAFETY: the token handle is checked before use and closed on every
    // path; the output buffer is a properly sized TOKEN_ELEVATION.
    unsafe {
        let mut token: HANDLE = ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
            return false;
        }

        let mut elevation: TOKEN_ELEVATION = mem::zeroed();
        let mut size: DWORD = 0;
        let ok = GetTokenInformation(
            token,
            TokenElevation,
            &mut elevation as *mut _ as LPVOID,
            mem::size_of::<TOKEN_ELEVATION>() as DWORD,
            &mut size,
        );
        CloseHandle(token);
        ok != 0 && elevation.TokenIsElevated != 0
    }
}

/// Whether the current process runs as root
#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    use crate::command::{CommandRunner, SystemRunner};

    SystemRunner
        .run("id", &["-u".to_string()])
        .map(|out| out.success() && out.stdout.trim() == "0")
        .unwrap_or(false)
}

