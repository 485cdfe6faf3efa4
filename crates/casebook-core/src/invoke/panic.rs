//! Keeps the location and backtrace of panics raised while a case runs.
//!
//! The process panic hook only sees the panic where it is raised, while the
//! payload surfaces later through `catch_unwind` or a thread join. The hook
//! installed here records the site per thread so the resulting [`Failure`]
//! can carry it.
//!
//! [`Failure`]: super::Failure

use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::HashMap;
use std::panic;
use std::sync::{Mutex, MutexGuard, Once, OnceLock};
use std::thread::{self, ThreadId};

static INSTALL: Once = Once::new();
static SITES: OnceLock<Mutex<HashMap<ThreadId, String>>> = OnceLock::new();

/// Installs the recording hook in front of the current one. Idempotent.
pub(crate) fn install() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let mut site = info
                .location()
                .map(|location| {
                    format!(
                        "   at {}:{}:{}",
                        location.file(),
                        location.line(),
                        location.column()
                    )
                })
                .unwrap_or_default();

            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                if !site.is_empty() {
                    site.push('\n');
                }
                site.push_str(&backtrace.to_string());
            }

            sites().insert(thread::current().id(), site);
            previous(info);
        }));
    });
}

/// Takes the site of the latest panic raised on `thread`.
pub(crate) fn take_site(thread: ThreadId) -> Option<String> {
    sites().remove(&thread).filter(|site| !site.is_empty())
}

fn sites() -> MutexGuard<'static, HashMap<ThreadId, String>> {
    SITES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
