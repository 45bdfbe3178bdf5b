//! Shared fakes for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tactile_browser::keyboard::KeyEvent;
use tactile_browser::mouse::MouseEvent;
use tactile_browser::{
    BrowserError, CancelSource, EventDispatch, RawBoxModel, RemoteHandle, RemoteQuery, Viewport,
};

type Sampler = Box<dyn Fn(u32) -> Option<RawBoxModel> + Send + Sync>;

/// Axis-aligned square box model with identical quads.
pub fn square(x: f64, y: f64, side: f64) -> RawBoxModel {
    let q = vec![x, y, x + side, y, x + side, y + side, x, y + side];
    RawBoxModel {
        content: q.clone(),
        padding: q.clone(),
        border: q.clone(),
        margin: q,
        width: side,
        height: side,
    }
}

/// A page whose box model for sample `n` is computed by a closure.
pub struct ScriptedPage {
    sampler: Sampler,
    viewport: Viewport,
    frame: Duration,
    cancel_on_frame: Option<Arc<CancelSource>>,
    samples: AtomicU32,
    frames: AtomicU32,
}

impl ScriptedPage {
    pub fn new(sampler: impl Fn(u32) -> Option<RawBoxModel> + Send + Sync + 'static) -> Self {
        Self {
            sampler: Box::new(sampler),
            viewport: Viewport::new(800.0, 600.0),
            frame: Duration::from_millis(1),
            cancel_on_frame: None,
            samples: AtomicU32::new(0),
            frames: AtomicU32::new(0),
        }
    }

    /// Always the same box.
    pub fn steady(model: RawBoxModel) -> Self {
        Self::new(move |_| Some(model.clone()))
    }

    /// Moves one pixel right on every sample, forever.
    pub fn drifting() -> Self {
        Self::new(|n| Some(square(f64::from(n), 10.0, 20.0)))
    }

    /// Not rendered for the first `misses` samples, then steady.
    pub fn attaching(misses: u32, model: RawBoxModel) -> Self {
        Self::new(move |n| (n >= misses).then(|| model.clone()))
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    /// Tear the page down from inside the next animation frame.
    pub fn cancelling(mut self, source: Arc<CancelSource>) -> Self {
        self.cancel_on_frame = Some(source);
        self
    }

    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> u32 {
        self.frames.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteQuery for ScriptedPage {
    async fn resolve_box_model(
        &self,
        _handle: &RemoteHandle,
    ) -> Result<Option<RawBoxModel>, BrowserError> {
        let n = self.samples.fetch_add(1, Ordering::SeqCst);
        Ok((self.sampler)(n))
    }

    async fn current_viewport(&self) -> Result<Viewport, BrowserError> {
        Ok(self.viewport)
    }

    async fn next_frame(&self) -> Result<(), BrowserError> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        if let Some(source) = &self.cancel_on_frame {
            source.cancel();
        }
        tokio::time::sleep(self.frame).await;
        Ok(())
    }
}

/// Records everything dispatched to the page.
#[derive(Default)]
pub struct RecordingEvents {
    pub mouse: Mutex<Vec<MouseEvent>>,
    pub keys: Mutex<Vec<KeyEvent>>,
    pub inserted: Mutex<Vec<String>>,
    pub focused: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn mouse_events(&self) -> Vec<MouseEvent> {
        self.mouse.lock().unwrap().clone()
    }

    pub fn key_events(&self) -> Vec<KeyEvent> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventDispatch for RecordingEvents {
    async fn dispatch_mouse_event(&self, event: &MouseEvent) -> Result<(), BrowserError> {
        self.mouse.lock().unwrap().push(*event);
        Ok(())
    }

    async fn dispatch_key_event(&self, event: &KeyEvent) -> Result<(), BrowserError> {
        self.keys.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), BrowserError> {
        self.inserted.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn focus(&self, handle: &RemoteHandle) -> Result<(), BrowserError> {
        handle.ensure_alive()?;
        self.focused.lock().unwrap().push(handle.object_id().to_string());
        Ok(())
    }
}
