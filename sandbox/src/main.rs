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

//! Headless sandbox: a simulated window, render surface and audio engine,
//! each on its own thread.
//!
//! Usage: `sandbox [config.json]`

use anyhow::Result;
use axle_core::{Executor, ExecutorMode};
use axle_runtime::{
    register_tick, ImageIndex, NativeWindowId, PlatformWindow, RenderSurface, RuntimeConfig,
    SurfaceError, ThreadContextGeneric, ThreadContextGfx, ThreadContextWnd, TickAdapter,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RUN_FOR: Duration = Duration::from_secs(2);
const SWAPCHAIN_IMAGES: u32 = 3;

struct SimWindow {
    id: NativeWindowId,
    events: AtomicU64,
}

impl PlatformWindow for SimWindow {
    fn native_id(&self) -> NativeWindowId {
        self.id
    }

    fn poll_events(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }
}

struct SimSurface {
    next: AtomicU32,
    presented: AtomicU64,
}

impl RenderSurface for SimSurface {
    fn acquire_next_image(&self) -> Result<ImageIndex, SurfaceError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(ImageIndex(n % SWAPCHAIN_IMAGES))
    }

    fn present(&self, _image: ImageIndex) -> Result<(), SurfaceError> {
        self.presented.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Accumulates simulated audio time.
#[derive(Default)]
struct SimMixer {
    micros: AtomicU64,
}

impl TickAdapter for SimMixer {
    fn tick(&self, dt_secs: f32) {
        self.micros
            .fetch_add((dt_secs * 1_000_000.0) as u64, Ordering::Relaxed);
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    log::info!("Sandbox starting with {:?}", config);

    // Window thread.
    let wnd = ThreadContextWnd::new("Window");
    wnd.start_app(
        || {
            Ok(Arc::new(SimWindow {
                id: NativeWindowId(1),
                events: AtomicU64::new(0),
            }) as Arc<dyn PlatformWindow>)
        },
        config.poll_interval(),
    )?;

    // Render thread.
    let gfx = ThreadContextGfx::new("Render");
    gfx.start_gfx(
        || {
            Ok(Arc::new(SimSurface {
                next: AtomicU32::new(0),
                presented: AtomicU64::new(0),
            }) as Arc<dyn RenderSurface>)
        },
        config.gfx_options(),
    )?;

    // Audio thread, ticking the mixer by elapsed time.
    let audio: ThreadContextGeneric = ThreadContextGeneric::new("Audio");
    audio.start_stateless(config.worker_sleep(), || {})?;
    let mixer = Arc::new(SimMixer::default());
    register_tick(&audio, mixer.clone(), None);

    // UI callbacks marshalled onto a dedicated thread.
    let ui = Executor::spawn("UI", ExecutorMode::Immediate)?;
    let registry = wnd.registry().clone();
    ui.queue_exec(move || {
        let routed = registry.dispatch(NativeWindowId(1), |window| window.native_id());
        log::info!("OS callback routed to {:?}", routed);
    });

    thread::sleep(RUN_FOR);

    let frames = gfx.frames();
    let last_frame_ms = gfx.last_frame_time() * 1000.0;
    log::info!(
        "Rendered {} frames in {:?} (last frame {:.3} ms)",
        frames,
        RUN_FOR,
        last_frame_ms
    );
    log::info!(
        "Mixed {:.3} s of audio",
        mixer.micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    );

    ui.shutdown();
    let timeout = config.stop_timeout();
    for outcome in [gfx.shutdown(timeout), audio.shutdown(timeout)] {
        log::debug!("Thread stop outcome: {:?}", outcome);
    }
    wnd.stop(true);

    log::info!("Sandbox stopped");
    Ok(())
}
