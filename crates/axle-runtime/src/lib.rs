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

//! # Axle Runtime
//!
//! Thread contexts binding thread-affine platform resources to their own
//! [`ThreadCycler`](axle_core::ThreadCycler): the window pump, the
//! render/present loop and generic ticking threads.

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod generic;
pub mod graphics;
pub mod platform;
pub mod registry;
pub mod tick;
pub mod window;

pub use config::RuntimeConfig;
pub use context::ThreadContext;
pub use error::{ConfigError, ContextError, SurfaceError};
pub use generic::{GenericState, ThreadContextGeneric};
pub use graphics::{GfxOptions, ThreadContextGfx};
pub use platform::{ImageIndex, NativeWindowId, PlatformWindow, RenderSurface};
pub use registry::WindowRegistry;
pub use tick::{register_tick, TickAdapter};
pub use window::ThreadContextWnd;
