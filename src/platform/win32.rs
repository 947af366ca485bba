//! Win32 backend: process creation, window enumeration and the hotkey message pump.

use crate::daemon::ControlEvent;
use crate::hotkey::Hotkey;
use crate::process::{LaunchError, LaunchSpec, Pid, ProcessHost, StdioHandle, check_launch_request};
use crate::window_locator::{WindowEntry, WindowSystem};
use anyhow::{Context, Result};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::AsRawHandle;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use windows::Win32::Foundation::{
    BOOL, CloseHandle, DUPLICATE_SAME_ACCESS, DuplicateHandle, HANDLE, HWND, LPARAM, TRUE,
    WAIT_OBJECT_0, WPARAM,
};
use windows::Win32::System::Threading::{
    CREATE_NEW_CONSOLE, CREATE_UNICODE_ENVIRONMENT, CreateProcessW, GetCurrentProcess,
    GetCurrentThreadId, OpenProcess, PROCESS_INFORMATION, PROCESS_SYNCHRONIZE,
    STARTF_USESTDHANDLES, STARTUPINFOW, WaitForSingleObject,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    MOD_ALT, MOD_CONTROL, MOD_NOREPEAT, RegisterHotKey, UnregisterHotKey,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetMessageW, GetWindowThreadProcessId, IsWindowVisible, MB_ICONWARNING, MB_OK,
    MSG, MessageBoxW, PostThreadMessageW, SW_HIDE, SW_MINIMIZE, SW_RESTORE, SW_SHOW, ShowWindow,
    WM_HOTKEY, WM_QUIT,
};
use windows::core::{HSTRING, PCWSTR, PWSTR};

const HOTKEY_ID: i32 = 1;
const DIALOG_TITLE: &str = "hotkey-toggle";

/// Closes the wrapped handle on every exit path.
struct HandleGuard(HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        // SAFETY: the guard is the sole owner of a valid handle.
        if let Err(e) = unsafe { CloseHandle(self.0) } {
            debug!("CloseHandle failed: {}", e);
        }
    }
}

fn to_wide(s: impl AsRef<std::ffi::OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
}

#[derive(Debug, Default)]
pub struct Win32Processes;

impl Win32Processes {
    pub fn new() -> Self {
        Win32Processes
    }
}

impl ProcessHost for Win32Processes {
    fn is_gone(&mut self, pid: Pid) -> bool {
        // SAFETY: plain handle-returning call; the handle is owned by the guard.
        let process = match unsafe { OpenProcess(PROCESS_SYNCHRONIZE, false, pid) } {
            Ok(handle) => HandleGuard(handle),
            Err(e) => {
                debug!("OpenProcess({}) failed, treating as gone: {}", pid, e);
                return true;
            }
        };

        // SAFETY: zero timeout, returns immediately.
        let wait = unsafe { WaitForSingleObject(process.0, 0) };
        wait == WAIT_OBJECT_0
    }

    fn launch(
        &mut self,
        spec: &LaunchSpec,
        stdio: Vec<Option<StdioHandle>>,
    ) -> Result<Pid, LaunchError> {
        check_launch_request(spec, &stdio)?;

        let duplicates = duplicate_slots(&stdio)?;
        let inherit = duplicates.iter().any(Option::is_some);

        let mut startup = STARTUPINFOW {
            cb: std::mem::size_of::<STARTUPINFOW>() as u32,
            ..Default::default()
        };
        if inherit {
            let raw = |slot: &Option<HandleGuard>| slot.as_ref().map(|g| g.0).unwrap_or_default();
            startup.dwFlags = STARTF_USESTDHANDLES;
            startup.hStdInput = raw(&duplicates[0]);
            startup.hStdOutput = raw(&duplicates[1]);
            startup.hStdError = raw(&duplicates[2]);
        }

        // CreateProcessW may modify the command line buffer in place
        let mut command_line = to_wide(spec.command_line());
        let directory = to_wide(spec.working_directory());
        let mut info = PROCESS_INFORMATION::default();

        // SAFETY: every pointer references a live local for the duration of the call.
        let created = unsafe {
            CreateProcessW(
                PCWSTR::null(),
                PWSTR(command_line.as_mut_ptr()),
                None,
                None,
                inherit,
                CREATE_NEW_CONSOLE | CREATE_UNICODE_ENVIRONMENT,
                None,
                PCWSTR(directory.as_ptr()),
                &startup,
                &mut info,
            )
        };
        drop(duplicates);

        created.map_err(|e| LaunchError::Spawn {
            command_line: spec.command_line().to_string(),
            source: std::io::Error::from_raw_os_error(e.code().0 & 0xFFFF),
        })?;

        // Neither handle is retained; liveness is probed by pid
        drop(HandleGuard(info.hThread));
        drop(HandleGuard(info.hProcess));
        Ok(info.dwProcessId)
    }
}

/// Duplicate each supplied handle as inheritable within the current process.
fn duplicate_slots(stdio: &[Option<StdioHandle>]) -> Result<Vec<Option<HandleGuard>>, LaunchError> {
    let mut duplicates = Vec::with_capacity(stdio.len());
    for (slot, handle) in stdio.iter().enumerate() {
        let Some(handle) = handle else {
            duplicates.push(None);
            continue;
        };

        let mut duplicate = HANDLE::default();
        // SAFETY: source handle is owned by the caller and valid; the
        // duplicate is owned by the returned guard.
        unsafe {
            let current = GetCurrentProcess();
            DuplicateHandle(
                current,
                HANDLE(handle.as_raw_handle()),
                current,
                &mut duplicate,
                0,
                true,
                DUPLICATE_SAME_ACCESS,
            )
        }
        .map_err(|e| LaunchError::DuplicateHandle {
            slot,
            source: std::io::Error::from_raw_os_error(e.code().0 & 0xFFFF),
        })?;
        duplicates.push(Some(HandleGuard(duplicate)));
    }
    Ok(duplicates)
}

/// Top-level windows via EnumWindows / GetWindowThreadProcessId.
#[derive(Debug, Default)]
pub struct Win32Windows;

impl Win32Windows {
    pub fn new() -> Self {
        Win32Windows
    }
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the address of the Vec passed by top_level_windows,
    // which outlives the EnumWindows call.
    let entries = unsafe { &mut *(lparam.0 as *mut Vec<WindowEntry<HWND>>) };

    let mut pid = 0u32;
    // SAFETY: hwnd comes straight from the enumeration.
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    entries.push(WindowEntry {
        window: hwnd,
        owner: (pid != 0).then_some(pid),
    });
    TRUE
}

impl WindowSystem for Win32Windows {
    type Window = HWND;

    fn top_level_windows(&mut self) -> Result<Vec<WindowEntry<HWND>>> {
        let mut entries: Vec<WindowEntry<HWND>> = Vec::new();
        // SAFETY: the callback only runs during this call.
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut entries as *mut Vec<WindowEntry<HWND>> as isize),
            )
        }
        .context("EnumWindows failed")?;
        Ok(entries)
    }

    fn is_visible(&mut self, window: HWND) -> bool {
        // SAFETY: a stale HWND simply reports not visible.
        unsafe { IsWindowVisible(window) }.as_bool()
    }

    fn set_visible(&mut self, window: HWND, visible: bool) {
        let command = if visible { SW_SHOW } else { SW_HIDE };
        // SAFETY: as above; the return value is the previous visibility.
        let _ = unsafe { ShowWindow(window, command) };
    }

    fn minimize(&mut self, window: HWND) {
        // SAFETY: as above.
        let _ = unsafe { ShowWindow(window, SW_MINIMIZE) };
    }

    fn restore(&mut self, window: HWND) {
        // SAFETY: as above.
        let _ = unsafe { ShowWindow(window, SW_RESTORE) };
    }
}

/// Thread owning the hotkey registration and its message queue.
///
/// WM_HOTKEY becomes `ControlEvent::Activate`, WM_QUIT becomes
/// `ControlEvent::Shutdown` with the quit code.
pub struct HotkeyPump {
    thread_id: u32,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyPump {
    /// Register `hotkey` on a new thread. Fails if the registration fails.
    pub fn start(hotkey: Hotkey, tx: mpsc::UnboundedSender<ControlEvent>) -> Result<Self> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<u32, String>>();

        let thread = std::thread::Builder::new()
            .name("hotkey-pump".to_string())
            .spawn(move || pump(hotkey, tx, ready_tx))
            .context("Failed to spawn hotkey thread")?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => Ok(HotkeyPump {
                thread_id,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                anyhow::bail!("RegisterHotKey failed for {}: {}", hotkey, e)
            }
            Err(_) => anyhow::bail!("Hotkey thread exited during startup"),
        }
    }
}

impl Drop for HotkeyPump {
    fn drop(&mut self) {
        // SAFETY: posting to a thread id we created; failure means it already exited.
        if let Err(e) =
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
        {
            debug!("Hotkey thread already gone: {}", e);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn pump(
    hotkey: Hotkey,
    tx: mpsc::UnboundedSender<ControlEvent>,
    ready: std_mpsc::Sender<Result<u32, String>>,
) {
    let modifiers = MOD_CONTROL | MOD_ALT | MOD_NOREPEAT;
    // SAFETY: registers against this thread's message queue.
    let registered =
        unsafe { RegisterHotKey(HWND::default(), HOTKEY_ID, modifiers, hotkey.virtual_key()) };
    if let Err(e) = registered {
        let _ = ready.send(Err(e.to_string()));
        return;
    }

    // SAFETY: trivial query.
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));
    info!("Registered hotkey {}", hotkey);

    let mut msg = MSG::default();
    loop {
        // SAFETY: msg is a valid out-pointer.
        let status = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        match status.0 {
            0 => {
                let code = msg.wParam.0 as i32;
                debug!("WM_QUIT received (code {})", code);
                let _ = tx.send(ControlEvent::Shutdown { code });
                break;
            }
            -1 => {
                error!("GetMessageW failed: {}", windows::core::Error::from_win32());
                let _ = tx.send(ControlEvent::Shutdown { code: 1 });
                break;
            }
            _ if msg.message == WM_HOTKEY && msg.wParam.0 == HOTKEY_ID as usize => {
                debug!("WM_HOTKEY received");
                if tx.send(ControlEvent::Activate { reply: None }).is_err() {
                    warn!("Daemon stopped, dropping hotkey press");
                    break;
                }
            }
            _ => {}
        }
    }

    // SAFETY: unregisters the id registered above on this same thread.
    if let Err(e) = unsafe { UnregisterHotKey(HWND::default(), HOTKEY_ID) } {
        debug!("UnregisterHotKey failed: {}", e);
    }
}

/// Warning message box for fatal startup errors.
pub fn show_error_dialog(message: &str) {
    // SAFETY: both strings outlive the modal call.
    unsafe {
        MessageBoxW(
            HWND::default(),
            &HSTRING::from(message),
            &HSTRING::from(DIALOG_TITLE),
            MB_ICONWARNING | MB_OK,
        );
    }
}
