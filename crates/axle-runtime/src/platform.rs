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

//! Contracts implemented by platform backends (Win32, X11, GL, DX11, Vulkan).
//!
//! The runtime never knows which backend sits behind these traits; it only
//! guarantees on which thread and when their methods are called.

use crate::error::SurfaceError;

/// Identifies a native window (HWND, X11 `Window`, ...) as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeWindowId(pub u64);

/// A platform window pumped by a [`ThreadContextWnd`](crate::ThreadContextWnd).
///
/// Created on the window thread and only pumped there.
pub trait PlatformWindow: Send + Sync {
    /// Returns the native handle, used to route OS callbacks to this window.
    fn native_id(&self) -> NativeWindowId;

    /// Drains and dispatches pending platform events.
    fn poll_events(&self);
}

/// Index of a presentable image in a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageIndex(pub u32);

/// A presentable surface driven by a [`ThreadContextGfx`](crate::ThreadContextGfx).
///
/// Its context is made current on the render thread, so both methods are only
/// called there.
pub trait RenderSurface: Send + Sync {
    /// Acquires the next image to render into. May block (vsync).
    fn acquire_next_image(&self) -> Result<ImageIndex, SurfaceError>;

    /// Presents a previously acquired image. May block (vsync).
    fn present(&self, image: ImageIndex) -> Result<(), SurfaceError>;
}
