//! Ctrl-C handling for `libris setup`.
//!
//! Once installed, SIGINT no longer terminates the process directly. A
//! listener thread decides: while a shielded section runs (the interactive
//! superuser step) the interrupt is only recorded, otherwise setup exits
//! with status 130. Captured steps run in their own process group, so the
//! listener forwards the interrupt to the tracked group before exiting.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::signal::unix::{signal, SignalKind};

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Default)]
struct Flags {
    shielded: AtomicBool,
    caught: AtomicBool,
    /// Process group of the running captured step; 0 when none.
    group: AtomicU32,
}

#[derive(Clone)]
pub struct Interrupts {
    flags: Arc<Flags>,
}

impl Interrupts {
    /// Register the SIGINT listener. The handler is in place when this returns.
    pub fn install() -> anyhow::Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to build signal runtime")?;
        let mut sigint = {
            let _guard = rt.enter();
            signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?
        };

        let flags = Arc::new(Flags::default());
        let listener = flags.clone();
        std::thread::spawn(move || {
            rt.block_on(async move {
                while sigint.recv().await.is_some() {
                    if listener.shielded.load(Ordering::SeqCst) {
                        listener.caught.store(true, Ordering::SeqCst);
                    } else {
                        let group = listener.group.load(Ordering::SeqCst);
                        if group != 0 {
                            crate::runner::signal_group(group, "-INT");
                        }
                        println!();
                        crate::output::failure("Setup interrupted.");
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            });
        });

        Ok(Self { flags })
    }

    /// Run `f` with interrupts recorded instead of fatal.
    ///
    /// Returns the closure's result and whether an interrupt arrived meanwhile.
    pub fn shielded<T>(&self, f: impl FnOnce() -> T) -> (T, bool) {
        self.flags.caught.store(false, Ordering::SeqCst);
        self.flags.shielded.store(true, Ordering::SeqCst);
        let out = f();
        self.flags.shielded.store(false, Ordering::SeqCst);
        (out, self.flags.caught.swap(false, Ordering::SeqCst))
    }

    /// Forward a fatal interrupt to process group `pgid` until [`Self::untrack`].
    pub fn track(&self, pgid: u32) {
        self.flags.group.store(pgid, Ordering::SeqCst);
    }

    pub fn untrack(&self) {
        self.flags.group.store(0, Ordering::SeqCst);
    }
}
