//! Console rendering of pipeline progress events
//!
//! One spinner at a time: a StartWait replaces the current spinner, a
//! StopWait clears it, completed steps print as green check lines so
//! the transcript survives scrollback.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use kosmo_common::eventbus::{Bus, Subscription};
use kosmo_common::events::{Event, EventId};

/// Renders bus events onto the terminal
pub struct ConsoleRenderer {
    spinner: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl ConsoleRenderer {
    /// Create a renderer; debug events are only shown when verbose
    pub fn new(verbose: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            verbose,
        })
    }

    /// Subscribe this renderer to all event kinds on the bus
    pub fn attach(self: &Arc<Self>, bus: &Bus) -> Vec<Subscription> {
        [
            EventId::StartWait,
            EventId::StopWait,
            EventId::Done,
            EventId::Debug,
            EventId::Warning,
        ]
        .into_iter()
        .map(|id| {
            let renderer = Arc::clone(self);
            bus.subscribe(id, Arc::new(move |event| renderer.handle(event)))
        })
        .collect()
    }

    fn handle(&self, event: &Event) {
        match event.id() {
            EventId::StartWait => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_message(event.message().to_string());
                bar.enable_steady_tick(Duration::from_millis(100));
                if let Some(previous) = self.swap_spinner(Some(bar)) {
                    previous.finish_and_clear();
                }
            }
            EventId::StopWait => {
                if let Some(bar) = self.swap_spinner(None) {
                    bar.finish_and_clear();
                }
            }
            EventId::Done => {
                if let Some(bar) = self.swap_spinner(None) {
                    bar.finish_and_clear();
                }
                println!("{} {}", style("✔").green(), event.message());
            }
            EventId::Debug => {
                if self.verbose {
                    println!("{}", style(event.message()).dim());
                }
            }
            EventId::Warning => {
                println!("{} {}", style("⚠").yellow(), style(event.message()).yellow());
            }
        }
    }

    fn swap_spinner(&self, next: Option<ProgressBar>) -> Option<ProgressBar> {
        let mut guard = self
            .spinner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
