//! Recognition thread and the coalescer → recognizer pipeline.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use glove_coalescer::{spawn_coalescer, CoalescerConfig, CoalescerHandle, DeviceEvent};
use glove_data::PlayerGestureInstance;
use tracing::{debug, info, warn};

use crate::manager::{RecognizedGesture, RecognizerManager};

// ════════════════════════════════════════════════════════════════════════════
// RecognitionWorker
// ════════════════════════════════════════════════════════════════════════════

/// Handle to a running recognition thread.
pub struct RecognitionWorker {
    pub output: Receiver<RecognizedGesture>,
    pub thread: JoinHandle<()>,
}

/// Recognize every instance arriving on `input` and forward accepted
/// gestures. The thread ends when `input` disconnects or `output` is
/// dropped.
pub fn spawn_recognition_worker(
    manager: Arc<RecognizerManager>,
    input:   Receiver<PlayerGestureInstance>,
) -> io::Result<RecognitionWorker> {
    let (tx, output) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("gesture-recognizer".into())
        .spawn(move || worker_thread(manager, input, tx))?;
    Ok(RecognitionWorker { output, thread })
}

fn worker_thread(
    manager: Arc<RecognizerManager>,
    input:   Receiver<PlayerGestureInstance>,
    output:  Sender<RecognizedGesture>,
) {
    info!("recognizer running");
    for item in input.iter() {
        let Some(recognized) = manager.recognize_player_gesture(&item) else {
            debug!(player = item.player.name(), samples = item.instance.num_samples(), "no gesture recognized");
            continue;
        };
        if output.send(recognized).is_err() {
            debug!("recognized gesture consumer gone");
            break;
        }
    }
    info!("recognizer stopped");
}

// ════════════════════════════════════════════════════════════════════════════
// Pipeline
// ════════════════════════════════════════════════════════════════════════════

/// Coalescer thread feeding a recognition thread.
pub struct Pipeline {
    pub stop:      Arc<AtomicBool>,
    pub coalescer: JoinHandle<()>,
    pub worker:    RecognitionWorker,
}

impl Pipeline {
    pub fn spawn(
        config:           CoalescerConfig,
        session_start_ms: u64,
        manager:          Arc<RecognizerManager>,
        events:           Receiver<DeviceEvent>,
    ) -> io::Result<Self> {
        let CoalescerHandle { output, stop, thread } = spawn_coalescer(config, session_start_ms, events)?;
        let worker = spawn_recognition_worker(manager, output)?;
        Ok(Pipeline { stop, coalescer: thread, worker })
    }

    pub fn output(&self) -> &Receiver<RecognizedGesture> {
        &self.worker.output
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Wait for both threads, then return whatever is still queued.
    pub fn join(self) -> Vec<RecognizedGesture> {
        if self.coalescer.join().is_err() {
            warn!("coalescer thread panicked");
        }
        if self.worker.thread.join().is_err() {
            warn!("recognizer thread panicked");
        }
        self.worker.output.try_iter().collect()
    }
}
