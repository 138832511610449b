//! Double-buffered frame scheduling.
//!
//! Each frame runs on one of [`FRAME_OVERLAP`] slots, chosen as
//! `frame_number % FRAME_OVERLAP`:
//!
//! ```text
//! 1. wait for the slot's render fence (bounded)
//! 2. reset the fence
//! 3. acquire a swapchain image, signaling the slot's present semaphore (bounded)
//! 4. reset and begin the slot's command buffer
//! 5. begin the render pass with the heartbeat clear colour
//! 6. record draws
//! 7. end the render pass and the command buffer
//! 8. submit: wait present semaphore, signal render semaphore and fence
//! 9. present, waiting on the render semaphore
//! 10. advance the frame counter
//! ```
//!
//! Every wait is bounded by the configured timeout; expiry is a fatal
//! [`FrameError::SyncTimeout`]. The slot's command buffer is only re-recorded
//! after step 1 observed its previous submission complete.
//!
//! If acquisition fails after step 2, the fence is signaled again through an
//! empty submission, so a later wait on that slot does not stall.

use std::f32::consts::PI;
use std::time::Duration;

use tracing::{debug, info, warn};
use vkengine_rhi::RhiResult;
use vkengine_rhi::swapchain::{AcquireResult, PresentResult};

use crate::dispatch::DrawRecorder;
use crate::error::{FrameError, FrameResult, SyncStage};

/// Number of frames the CPU may record ahead of the GPU.
pub const FRAME_OVERLAP: usize = 2;

/// The GPU side of one frame, per slot.
///
/// Implemented over Vulkan by [`crate::frame::VulkanFrameBackend`].
pub trait FrameBackend {
    type Recorder: DrawRecorder;

    /// Waits for the slot's render fence. Returns `false` on timeout.
    fn wait_for_fence(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<bool>;

    fn reset_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Signals the slot's render fence without recording anything, for a
    /// frame abandoned between reset and submit.
    fn signal_fence(&mut self, slot: usize) -> RhiResult<()>;

    fn acquire_image(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<AcquireResult>;

    /// Resets the slot's command buffer and begins one-time recording.
    fn begin_commands(&mut self, slot: usize) -> RhiResult<()>;

    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_color: [f32; 4]);

    /// Recorder writing into the slot's command buffer.
    fn recorder(&mut self, slot: usize) -> Self::Recorder;

    /// Ends the render pass and the command buffer.
    fn end_commands(&mut self, slot: usize) -> RhiResult<()>;

    fn submit(&mut self, slot: usize) -> RhiResult<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentResult>;
}

/// What a frame's recording callback knows about the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInfo {
    pub frame_number: u64,
    pub slot: usize,
    pub image_index: u32,
    /// Heartbeat value in `0.0..=1.0`, also used as the clear colour's blue.
    pub heartbeat: f32,
}

/// Heartbeat value for `frame_number`: `|sin|` with one full cycle every
/// `period` frames.
pub fn heartbeat(frame_number: u64, period: u32) -> f32 {
    let period = period.max(1) as u64;
    let phase = (frame_number % period) as f32 / period as f32;
    (phase * PI).sin().abs()
}

/// Clear colour for `frame_number`.
pub fn clear_color(frame_number: u64, period: u32) -> [f32; 4] {
    [0.0, 0.0, heartbeat(frame_number, period), 1.0]
}

/// Drives [`FRAME_OVERLAP`] frame slots of a [`FrameBackend`].
pub struct FrameScheduler<B: FrameBackend> {
    backend: B,
    frame_number: u64,
    timeout_ns: u64,
    heartbeat_period: u32,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn new(backend: B, timeout: Duration, heartbeat_period: u32) -> Self {
        info!(
            "Frame scheduler: {} slots, {:?} timeout",
            FRAME_OVERLAP, timeout
        );
        Self {
            backend,
            frame_number: 0,
            timeout_ns: u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX),
            heartbeat_period,
        }
    }

    /// Frames presented so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Slot the next frame runs on.
    #[inline]
    pub fn current_slot(&self) -> usize {
        (self.frame_number % FRAME_OVERLAP as u64) as usize
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Runs one frame, calling `record` between render pass begin and end.
    ///
    /// # Errors
    ///
    /// - [`FrameError::SyncTimeout`] if the fence wait or the image
    ///   acquisition exceeds the timeout
    /// - [`FrameError::SwapchainOutOfDate`] if acquire or present reports an
    ///   out-of-date or suboptimal swapchain
    /// - [`FrameError::Rhi`] for any other Vulkan failure
    ///
    /// On error the frame counter is not advanced.
    pub fn draw_frame<T, F>(&mut self, record: F) -> FrameResult<T>
    where
        F: FnOnce(&mut B::Recorder, &FrameInfo) -> T,
    {
        let slot = self.current_slot();

        if !self.backend.wait_for_fence(slot, self.timeout_ns)? {
            return Err(FrameError::SyncTimeout {
                stage: SyncStage::RenderFence,
                slot,
            });
        }
        self.backend.reset_fence(slot)?;

        let image_index = match self.acquire(slot) {
            Ok(index) => index,
            Err(e) => {
                // The fence was reset but nothing will be submitted on it.
                if let Err(signal) = self.backend.signal_fence(slot) {
                    warn!("Failed to re-signal fence of slot {}: {}", slot, signal);
                }
                return Err(e);
            }
        };

        let info = FrameInfo {
            frame_number: self.frame_number,
            slot,
            image_index,
            heartbeat: heartbeat(self.frame_number, self.heartbeat_period),
        };

        self.backend.begin_commands(slot)?;
        self.backend.begin_render_pass(
            slot,
            image_index,
            clear_color(self.frame_number, self.heartbeat_period),
        );

        let mut recorder = self.backend.recorder(slot);
        let output = record(&mut recorder, &info);

        self.backend.end_commands(slot)?;
        self.backend.submit(slot)?;

        match self.backend.present(slot, image_index)? {
            PresentResult::Presented => {}
            PresentResult::Suboptimal | PresentResult::OutOfDate => {
                warn!("Swapchain out of date on present (frame {})", self.frame_number);
                return Err(FrameError::SwapchainOutOfDate);
            }
        }

        self.frame_number += 1;
        Ok(output)
    }

    fn acquire(&mut self, slot: usize) -> FrameResult<u32> {
        match self.backend.acquire_image(slot, self.timeout_ns)? {
            AcquireResult::Ready(index) => Ok(index),
            AcquireResult::Suboptimal(_) | AcquireResult::OutOfDate => {
                warn!("Swapchain out of date on acquire (frame {})", self.frame_number);
                Err(FrameError::SwapchainOutOfDate)
            }
            AcquireResult::TimedOut => Err(FrameError::SyncTimeout {
                stage: SyncStage::ImageAcquire,
                slot,
            }),
        }
    }

    /// Waits for every slot's last submission.
    ///
    /// All slots are waited on even if one times out; the first timeout is
    /// returned.
    pub fn drain(&mut self) -> FrameResult<()> {
        let mut result = Ok(());
        for slot in 0..FRAME_OVERLAP {
            let finished = self.backend.wait_for_fence(slot, self.timeout_ns);
            let outcome = match finished {
                Ok(true) => Ok(()),
                Ok(false) => Err(FrameError::SyncTimeout {
                    stage: SyncStage::RenderFence,
                    slot,
                }),
                Err(e) => Err(FrameError::from(e)),
            };
            if let Err(e) = outcome
                && result.is_ok()
            {
                result = Err(e);
            }
        }
        debug!("Drained {} frame slots", FRAME_OVERLAP);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vkengine_rhi::vk;

    use crate::push_constants::MeshPushConstants;

    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Wait(usize),
        ResetFence(usize),
        SignalFence(usize),
        Acquire(usize),
        Begin(usize),
        RenderPass(usize, u32),
        Draw(usize),
        End(usize),
        Submit(usize),
        Present(usize, u32),
    }

    /// Simulated GPU: a submission stays in flight until the slot's fence
    /// is waited on, unless the GPU is hung. A reset fence with nothing
    /// submitted never signals.
    #[derive(Default)]
    struct MockState {
        events: Vec<Event>,
        in_flight: [bool; FRAME_OVERLAP],
        unsignaled: [bool; FRAME_OVERLAP],
        violations: Vec<usize>,
        hung: bool,
        acquire: Option<AcquireResult>,
        present: Option<PresentResult>,
        next_image: u32,
    }

    #[derive(Clone, Default)]
    struct MockBackend(Rc<RefCell<MockState>>);

    struct MockRecorder {
        state: Rc<RefCell<MockState>>,
        slot: usize,
    }

    impl DrawRecorder for MockRecorder {
        fn bind_pipeline(&mut self, _pipeline: vk::Pipeline) {}
        fn bind_vertex_buffer(&mut self, _buffer: vk::Buffer) {}
        fn push_constants(&mut self, _layout: vk::PipelineLayout, _c: &MeshPushConstants) {}
        fn draw(&mut self, _vertex_count: u32) {
            self.state.borrow_mut().events.push(Event::Draw(self.slot));
        }
    }

    impl FrameBackend for MockBackend {
        type Recorder = MockRecorder;

        fn wait_for_fence(&mut self, slot: usize, _timeout_ns: u64) -> RhiResult<bool> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::Wait(slot));
            if state.unsignaled[slot] && (!state.in_flight[slot] || state.hung) {
                return Ok(false);
            }
            state.in_flight[slot] = false;
            state.unsignaled[slot] = false;
            Ok(true)
        }

        fn reset_fence(&mut self, slot: usize) -> RhiResult<()> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::ResetFence(slot));
            state.unsignaled[slot] = true;
            Ok(())
        }

        fn signal_fence(&mut self, slot: usize) -> RhiResult<()> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::SignalFence(slot));
            state.in_flight[slot] = true;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize, _timeout_ns: u64) -> RhiResult<AcquireResult> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::Acquire(slot));
            if let Some(result) = state.acquire {
                return Ok(result);
            }
            let index = state.next_image;
            state.next_image = (index + 1) % 3;
            Ok(AcquireResult::Ready(index))
        }

        fn begin_commands(&mut self, slot: usize) -> RhiResult<()> {
            let mut state = self.0.borrow_mut();
            if state.in_flight[slot] {
                state.violations.push(slot);
            }
            state.events.push(Event::Begin(slot));
            Ok(())
        }

        fn begin_render_pass(&mut self, slot: usize, image_index: u32, _clear: [f32; 4]) {
            self.0
                .borrow_mut()
                .events
                .push(Event::RenderPass(slot, image_index));
        }

        fn recorder(&mut self, slot: usize) -> MockRecorder {
            MockRecorder {
                state: self.0.clone(),
                slot,
            }
        }

        fn end_commands(&mut self, slot: usize) -> RhiResult<()> {
            self.0.borrow_mut().events.push(Event::End(slot));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> RhiResult<()> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::Submit(slot));
            state.in_flight[slot] = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentResult> {
            let mut state = self.0.borrow_mut();
            state.events.push(Event::Present(slot, image_index));
            Ok(state.present.unwrap_or(PresentResult::Presented))
        }
    }

    fn scheduler() -> (FrameScheduler<MockBackend>, Rc<RefCell<MockState>>) {
        let backend = MockBackend::default();
        let state = backend.0.clone();
        (
            FrameScheduler::new(backend, Duration::from_secs(1), 120),
            state,
        )
    }

    #[test]
    fn test_single_frame_advances_counter() {
        let (mut scheduler, state) = scheduler();
        assert_eq!(scheduler.frame_number(), 0);

        scheduler
            .draw_frame(|recorder, _| recorder.draw(3))
            .unwrap();

        assert_eq!(scheduler.frame_number(), 1);
        assert_eq!(
            state.borrow().events,
            vec![
                Event::Wait(0),
                Event::ResetFence(0),
                Event::Acquire(0),
                Event::Begin(0),
                Event::RenderPass(0, 0),
                Event::Draw(0),
                Event::End(0),
                Event::Submit(0),
                Event::Present(0, 0),
            ]
        );
    }

    #[test]
    fn test_slots_alternate() {
        let (mut scheduler, _) = scheduler();
        let mut slots = Vec::new();
        for _ in 0..5 {
            slots.push(scheduler.draw_frame(|_, info| info.slot).unwrap());
        }
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(scheduler.frame_number(), 5);
    }

    #[test]
    fn test_never_records_over_in_flight_submission() {
        let (mut scheduler, state) = scheduler();
        for _ in 0..10 {
            scheduler.draw_frame(|_, _| ()).unwrap();
        }

        let state = state.borrow();
        assert!(state.violations.is_empty());

        // Every Begin(slot) is preceded by a Wait(slot) since that slot's
        // last Submit.
        let mut waited = [true; FRAME_OVERLAP];
        for event in &state.events {
            match *event {
                Event::Wait(slot) => waited[slot] = true,
                Event::Submit(slot) => waited[slot] = false,
                Event::Begin(slot) => assert!(waited[slot]),
                _ => {}
            }
        }
    }

    #[test]
    fn test_fence_timeout_is_fatal() {
        let (mut scheduler, state) = scheduler();
        scheduler.draw_frame(|_, _| ()).unwrap();
        scheduler.draw_frame(|_, _| ()).unwrap();
        state.borrow_mut().hung = true;

        let result = scheduler.draw_frame(|_, _| ());

        assert!(matches!(
            result,
            Err(FrameError::SyncTimeout {
                stage: SyncStage::RenderFence,
                slot: 0
            })
        ));
        assert_eq!(scheduler.frame_number(), 2);
        assert_eq!(state.borrow().events.last(), Some(&Event::Wait(0)));
    }

    #[test]
    fn test_acquire_timeout_is_fatal() {
        let (mut scheduler, state) = scheduler();
        state.borrow_mut().acquire = Some(AcquireResult::TimedOut);

        let result = scheduler.draw_frame(|_, _| ());

        assert!(matches!(
            result,
            Err(FrameError::SyncTimeout {
                stage: SyncStage::ImageAcquire,
                ..
            })
        ));
        assert!(!state.borrow().events.contains(&Event::Begin(0)));
    }

    #[test]
    fn test_out_of_date_swapchain_is_fatal() {
        let (mut scheduler, state) = scheduler();
        state.borrow_mut().acquire = Some(AcquireResult::Suboptimal(1));
        assert!(matches!(
            scheduler.draw_frame(|_, _| ()),
            Err(FrameError::SwapchainOutOfDate)
        ));

        let (mut scheduler, state) = self::scheduler();
        state.borrow_mut().present = Some(PresentResult::OutOfDate);
        assert!(matches!(
            scheduler.draw_frame(|_, _| ()),
            Err(FrameError::SwapchainOutOfDate)
        ));
        assert_eq!(scheduler.frame_number(), 0);
    }

    #[test]
    fn test_failed_acquire_leaves_fence_signaled() {
        let (mut scheduler, state) = scheduler();
        state.borrow_mut().acquire = Some(AcquireResult::TimedOut);
        assert!(scheduler.draw_frame(|_, _| ()).is_err());

        assert_eq!(
            state.borrow().events,
            vec![
                Event::Wait(0),
                Event::ResetFence(0),
                Event::Acquire(0),
                Event::SignalFence(0),
            ]
        );
        assert!(scheduler.drain().is_ok());
    }

    #[test]
    fn test_out_of_date_acquire_does_not_stall_drain() {
        let (mut scheduler, state) = scheduler();
        scheduler.draw_frame(|_, _| ()).unwrap();
        state.borrow_mut().acquire = Some(AcquireResult::OutOfDate);

        assert!(matches!(
            scheduler.draw_frame(|_, _| ()),
            Err(FrameError::SwapchainOutOfDate)
        ));
        assert!(scheduler.drain().is_ok());
    }

    #[test]
    fn test_drain_reports_hung_slot() {
        let (mut scheduler, state) = scheduler();
        scheduler.draw_frame(|_, _| ()).unwrap();
        assert!(scheduler.drain().is_ok());

        scheduler.draw_frame(|_, _| ()).unwrap();
        state.borrow_mut().hung = true;
        assert!(matches!(
            scheduler.drain(),
            Err(FrameError::SyncTimeout { slot: 1, .. })
        ));
    }

    #[test]
    fn test_heartbeat_cycles() {
        assert_eq!(heartbeat(0, 120), 0.0);
        assert!((heartbeat(60, 120) - 1.0).abs() < 1e-6);
        assert_eq!(heartbeat(120, 120), 0.0);
        assert_eq!(clear_color(60, 120)[3], 1.0);
        assert!((0..500).all(|n| (0.0..=1.0).contains(&heartbeat(n, 120))));
    }
}
