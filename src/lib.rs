pub mod error;
pub mod config;
pub mod session;
pub mod client;
pub mod guards;
pub mod api;
pub mod runtime;

pub use error::{SessionError, SessionResult};
pub use runtime::SessionRuntime;

/// Session trace line on stderr, tagged `[taskdesk]`. Silent in release
/// builds, where the arguments are still type-checked.
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => {
        if cfg!(any(test, debug_assertions)) {
            eprintln!("[taskdesk] {}", format_args!($($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn tprintln_accepts_format_arguments() {
        let user = "7";
        crate::tprintln!("session.establish user={user} role={}", "admin");
    }
}
