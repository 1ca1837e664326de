// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The render thread: owns a [`RenderSurface`], presents every iteration and
//! paces frames to an optional soft cap.

use crate::context::ThreadContext;
use crate::error::ContextError;
use crate::platform::RenderSurface;
use axle_core::utils::lock;
use axle_core::Stopwatch;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Longest frame period the pacer honours; longer caps disable pacing.
pub const MAX_FRAME_CAP: Duration = Duration::from_secs(60);

/// Start-up options of a [`ThreadContextGfx`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GfxOptions {
    /// Minimum frame period in seconds. `<= 0`, non-finite or above
    /// [`MAX_FRAME_CAP`] disables the cap.
    pub frame_cap_secs: f32,
    /// Acquire and present an image every frame.
    pub auto_present: bool,
}

impl Default for GfxOptions {
    fn default() -> Self {
        Self {
            frame_cap_secs: 0.0,
            auto_present: true,
        }
    }
}

/// Frame pacing state shared between the context and its tick.
#[derive(Debug)]
struct FramePacer {
    frame_cap: AtomicU32,
    last_frame_time: AtomicU32,
    auto_present: AtomicBool,
    frames: AtomicU64,
    // Restarted at the end of every frame.
    clock: Mutex<Stopwatch>,
}

impl FramePacer {
    fn new(options: GfxOptions) -> Self {
        Self {
            frame_cap: AtomicU32::new(options.frame_cap_secs.to_bits()),
            last_frame_time: AtomicU32::new(0.0f32.to_bits()),
            auto_present: AtomicBool::new(options.auto_present),
            frames: AtomicU64::new(0),
            clock: Mutex::new(Stopwatch::new()),
        }
    }

    fn frame_cap(&self) -> f32 {
        f32::from_bits(self.frame_cap.load(Ordering::Relaxed))
    }

    /// Sleeps off whatever remains of the cap since the previous frame ended.
    fn end_frame(&self) {
        let mut clock = lock(&self.clock);
        let busy = clock.elapsed();
        self.last_frame_time
            .store(busy.as_secs_f32().to_bits(), Ordering::Relaxed);

        // Caps that do not fit a `Duration` pace like no cap at all.
        let cap = self.frame_cap();
        if cap > 0.0 {
            if let Ok(target) = Duration::try_from_secs_f32(cap) {
                if target <= MAX_FRAME_CAP && busy < target {
                    thread::sleep(target - busy);
                }
            }
        }

        clock.reset();
        self.frames.fetch_add(1, Ordering::Relaxed);
    }
}

fn present_frame(surface: &dyn RenderSurface, name: &str) {
    let image = match surface.acquire_next_image() {
        Ok(image) => image,
        Err(err) => {
            log::warn!("[{}] Failed to acquire next image: {}", name, err);
            return;
        }
    };
    if let Err(err) = surface.present(image) {
        log::warn!("[{}] Failed to present image {:?}: {}", name, image, err);
    }
}

/// A [`ThreadContext`] owning a [`RenderSurface`].
///
/// The thread never sleeps between iterations; the soft frame cap is the only
/// throttle besides blocking presents.
#[derive(Debug)]
pub struct ThreadContextGfx {
    context: ThreadContext<dyn RenderSurface>,
    pacer: Arc<FramePacer>,
}

impl ThreadContextGfx {
    /// Creates a render context. Nothing runs until [`start_gfx`](Self::start_gfx).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            context: ThreadContext::new(name),
            pacer: Arc::new(FramePacer::new(GfxOptions::default())),
        }
    }

    /// Creates the surface on the render thread and starts the frame loop.
    pub fn start_gfx<C>(&self, creator: C, options: GfxOptions) -> Result<(), ContextError>
    where
        C: FnOnce() -> anyhow::Result<Arc<dyn RenderSurface>> + Send + 'static,
    {
        self.set_frame_cap(options.frame_cap_secs);
        self.set_auto_present(options.auto_present);

        let pacer = Arc::clone(&self.pacer);
        let name = self.context.name().to_owned();
        self.context.start(Duration::ZERO, creator, move |surface| {
            if pacer.auto_present.load(Ordering::Relaxed) {
                present_frame(surface, &name);
            }
            pacer.end_frame();
        })
    }

    /// Sets the minimum frame period in seconds; `<= 0`, non-finite or
    /// above [`MAX_FRAME_CAP`] removes the cap.
    pub fn set_frame_cap(&self, secs: f32) {
        self.pacer.frame_cap.store(secs.to_bits(), Ordering::Relaxed);
    }

    /// The current minimum frame period in seconds.
    pub fn frame_cap(&self) -> f32 {
        self.pacer.frame_cap()
    }

    /// Time spent in the last frame before pacing, in seconds.
    pub fn last_frame_time(&self) -> f32 {
        f32::from_bits(self.pacer.last_frame_time.load(Ordering::Relaxed))
    }

    /// Number of frames completed since creation.
    pub fn frames(&self) -> u64 {
        self.pacer.frames.load(Ordering::Relaxed)
    }

    /// Turns acquire/present on or off. When off the tick only paces.
    pub fn set_auto_present(&self, enabled: bool) {
        self.pacer.auto_present.store(enabled, Ordering::Relaxed);
    }
}

impl Deref for ThreadContextGfx {
    type Target = ThreadContext<dyn RenderSurface>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
