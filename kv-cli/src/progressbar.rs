//! The global quiet-aware error-message output shared across the REPL and
//! the `leader`/`follower` subcommands.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

pub struct ProgressOutput {
    quiet: AtomicBool,
}

impl ProgressOutput {
    pub const fn new() -> Self {
        ProgressOutput { quiet: AtomicBool::new(false) }
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::SeqCst);
    }

    fn is_quiet(&self) -> bool {
        self.quiet.load(Ordering::SeqCst)
    }

    pub fn error(&self, message: &str) {
        if self.is_quiet() {
            return;
        }
        eprintln!("{}", message.red());
    }
}
