//! OS backends for the process and window primitives.

#[cfg(unix)]
pub mod sway;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod win32;

/// Report an error that stops the daemon before it starts.
pub fn report_fatal(message: &str) {
    tracing::error!("{}", message);
    #[cfg(windows)]
    win32::show_error_dialog(message);
}
