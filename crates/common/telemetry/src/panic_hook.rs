// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Panics become ERROR events with a backtrace, so they land in the error log
//! file next to sink failures and requeue losses.

#[cfg(feature = "deadlock_detection")]
use std::time::Duration;
use std::{panic, sync::LazyLock};

use backtrace::Backtrace;
use prometheus::{IntCounter, register_int_counter};

pub static PANIC_COUNTER: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("logbuf_panic_total", "Number of panics observed").unwrap()
});

/// Chain a logging hook in front of the current panic hook.
///
/// With the `deadlock_detection` feature, also starts a thread that reports
/// `parking_lot` deadlocks every five seconds; the engine lock is a
/// `parking_lot::Mutex`.
pub fn set_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic| {
        let backtrace = format!("{:?}", Backtrace::new());
        if let Some(location) = panic.location() {
            tracing::error!(
                component = "panic_hook",
                message = %panic,
                backtrace = %backtrace,
                panic.file = location.file(),
                panic.line = location.line(),
            );
        } else {
            tracing::error!(component = "panic_hook", message = %panic, backtrace = %backtrace);
        }
        PANIC_COUNTER.inc();
        default_hook(panic);
    }));

    #[cfg(feature = "deadlock_detection")]
    let _ = std::thread::spawn(move || {
        loop {
            std::thread::sleep(Duration::from_secs(5));
            let deadlocks = parking_lot::deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            tracing::error!(component = "panic_hook", count = deadlocks.len(), "deadlocks detected");
            for (i, threads) in deadlocks.iter().enumerate() {
                for t in threads {
                    tracing::error!(
                        deadlock = i,
                        thread_id = ?t.thread_id(),
                        backtrace = ?t.backtrace(),
                    );
                }
            }
        }
    });
}
