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

//! Compile-time proof of running on a cycle thread.
//!
//! A [`CycleToken`] can only be obtained on a cycle thread, either from
//! [`CyclerHandle::check_thread`](crate::CyclerHandle::check_thread) or as the
//! argument of a job queued with
//! [`CyclerHandle::enqueue_affine`](crate::CyclerHandle::enqueue_affine). It is
//! neither `Send` nor `Sync`, so it can never leave that thread. Native
//! resources whose calls are only valid on their creation thread (a GL context
//! made current, a window handle pumped by its creator) can take
//! `&CycleToken` in their API and let the compiler enforce the rule.
//!
//! ```compile_fail
//! fn assert_send<T: Send>() {}
//! assert_send::<axle_core::CycleToken>();
//! ```

use std::marker::PhantomData;
use std::thread::ThreadId;

/// Marker proving that the holder runs on a specific cycle thread.
#[derive(Debug)]
pub struct CycleToken {
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl CycleToken {
    pub(crate) fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            _not_send: PhantomData,
        }
    }

    /// Returns the cycle thread this token was issued on.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }
}
