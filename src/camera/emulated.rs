//! Emulated camera for development without the physical build.
//!
//! The camera serves a shared scene buffer at the configured frame rate.
//! Whoever holds the [`SceneHandle`] (a test, the demo's fake controller
//! board) redraws the scene between captures.

use crate::camera::{Camera, Frame};
use crate::config::CameraConfig;
use crate::Result;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared drawing surface of an [`EmulatedCamera`].
#[derive(Clone)]
pub struct SceneHandle {
    frame: Arc<Mutex<Frame>>,
}

impl SceneHandle {
    /// Run `f` against the scene. The next capture picks the change up.
    pub fn draw(&self, f: impl FnOnce(&mut Frame)) {
        let mut frame = self.frame.lock().unwrap();
        f(&mut frame);
    }

    pub fn clear(&self) {
        self.draw(|frame| frame.fill(0));
    }
}

pub struct EmulatedCamera {
    scene: SceneHandle,
    resolution: (u32, u32),
    framerate: f32,
    frame_count: u64,
}

impl EmulatedCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let frame = Frame::new(config.width(), config.height());
        Self {
            scene: SceneHandle {
                frame: Arc::new(Mutex::new(frame)),
            },
            resolution: (config.width(), config.height()),
            framerate: config.framerate,
            frame_count: 0,
        }
    }

    pub fn scene(&self) -> SceneHandle {
        self.scene.clone()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Camera for EmulatedCamera {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn framerate(&self) -> f32 {
        self.framerate
    }

    fn capture(&mut self) -> impl Future<Output = Result<Frame>> + Send {
        self.frame_count += 1;
        let interval = Duration::from_secs_f32(1.0 / self.framerate);
        let scene = self.scene.clone();
        async move {
            // wait out the frame interval first, then snapshot, so drawing
            // that happened while this frame was pending is picked up
            tokio::time::sleep(interval).await;
            let frame = scene.frame.lock().unwrap().clone();
            Ok(frame)
        }
    }
}
