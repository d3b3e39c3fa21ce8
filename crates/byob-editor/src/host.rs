//! Seams to the host environment: the palette UI and the script scheduler.
//!
//! The project never renders a palette; it only tells the host that cached
//! renderings are stale. Slot-edited helper scripts are handed to the
//! host's scheduler as independent processes, with no join handle beyond an
//! opaque [`ProcessHandle`].

use byob_core::id::ReceiverId;
use byob_core::script::ReifiedScript;
use byob_core::variables::VariableFrame;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Palette callbacks invoked after every structural change.
pub trait PaletteHost {
    fn flush_palette_cache(&mut self);
    fn refresh_palette(&mut self);
    /// Re-evaluates which categories are empty.
    fn refresh_empty_categories(&mut self);
}

/// A palette host that only counts the calls it receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingHost {
    pub flushes: usize,
    pub refreshes: usize,
    pub category_refreshes: usize,
}

impl PaletteHost for RecordingHost {
    fn flush_palette_cache(&mut self) {
        self.flushes += 1;
    }

    fn refresh_palette(&mut self) {
        self.refreshes += 1;
    }

    fn refresh_empty_categories(&mut self) {
        self.category_refreshes += 1;
    }
}

/// Identity of a launched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessHandle(pub Uuid);

/// The host's script scheduler. Processes are started, never awaited.
pub trait Scheduler {
    fn start_process(
        &mut self,
        script: ReifiedScript,
        receiver: ReceiverId,
        bindings: VariableFrame,
    ) -> ProcessHandle;
}

/// A process waiting in a [`QueueScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedProcess {
    pub handle: ProcessHandle,
    pub script: ReifiedScript,
    pub receiver: ReceiverId,
    pub bindings: VariableFrame,
}

/// A scheduler that queues processes for the host to step later.
#[derive(Debug, Clone, Default)]
pub struct QueueScheduler {
    pub queue: Vec<QueuedProcess>,
}

impl Scheduler for QueueScheduler {
    fn start_process(
        &mut self,
        script: ReifiedScript,
        receiver: ReceiverId,
        bindings: VariableFrame,
    ) -> ProcessHandle {
        let handle = ProcessHandle(Uuid::new_v4());
        self.queue.push(QueuedProcess {
            handle,
            script,
            receiver,
            bindings,
        });
        handle
    }
}
