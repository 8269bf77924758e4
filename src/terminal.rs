//! Terminal size detection.

use std::env;

/// Width used when the terminal size cannot be determined.
pub const DEFAULT_WIDTH: usize = 80;

/// Returns the width of the controlling terminal in columns.
///
/// `COLUMNS` takes precedence when it holds a positive number. Otherwise
/// the size is queried from `/dev/tty`, stdout and stderr in that order.
pub fn width() -> Option<usize> {
    columns_env(env::var("COLUMNS").ok().as_deref()).or_else(sys::width)
}

/// Like [`width`], falling back to [`DEFAULT_WIDTH`].
pub fn width_or_default() -> usize {
    width().unwrap_or(DEFAULT_WIDTH)
}

fn columns_env(value: Option<&str>) -> Option<usize> {
    value?.trim().parse().ok().filter(|&cols| cols > 0)
}

#[cfg(unix)]
mod sys {
    use std::{fs::File, os::unix::io::AsRawFd};

    use log::trace;

    pub(super) fn width() -> Option<usize> {
        if let Ok(tty) = File::open("/dev/tty") {
            if let Some(cols) = fd_width(tty.as_raw_fd()) {
                return Some(cols);
            }
        }
        fd_width(libc::STDOUT_FILENO).or_else(|| fd_width(libc::STDERR_FILENO))
    }

    fn fd_width(fd: libc::c_int) -> Option<usize> {
        // SAFETY: `winsize` is plain data and TIOCGWINSZ only writes into it.
        let mut size: libc::winsize = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
        if ret != 0 {
            trace!("TIOCGWINSZ failed on fd {}", fd);
            return None;
        }
        match size.ws_col {
            0 => None,
            cols => Some(usize::from(cols)),
        }
    }
}

#[cfg(not(unix))]
mod sys {
    pub(super) fn width() -> Option<usize> {
        None
    }
}
