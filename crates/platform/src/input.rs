//! Input events and keyboard state.
//!
//! The application translates winit events into [`InputEvent`]s and queues
//! them; once per iteration the engine applies the queue to an
//! [`InputState`] and reads camera motion intent and quit requests from it.

use std::collections::HashSet;

use glam::Vec3;

pub use winit::keyboard::KeyCode;

/// One event crossing the platform boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The windowing system asked the application to exit.
    Quit,
    KeyDown(KeyCode),
    KeyUp(KeyCode),
}

/// Keyboard state accumulated from [`InputEvent`]s.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    quit_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears edge-triggered state. Call once per iteration before applying
    /// that iteration's events.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Quit => self.quit_requested = true,
            InputEvent::KeyDown(key) => {
                if self.pressed_keys.insert(key) {
                    self.just_pressed_keys.insert(key);
                }
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(&key);
            }
        }
    }

    /// Applies a drained event queue in order.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = InputEvent>) {
        for event in events {
            self.apply(event);
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Camera motion direction from held keys, in world axes.
    ///
    /// A/D move along X, Q/E along Y and W/S along Z (W is -Z, into the
    /// screen). Opposing keys cancel. Components are -1, 0 or 1.
    pub fn motion_intent(&self) -> Vec3 {
        let axis = |positive: KeyCode, negative: KeyCode| -> f32 {
            let mut value = 0.0;
            if self.is_key_pressed(positive) {
                value += 1.0;
            }
            if self.is_key_pressed(negative) {
                value -= 1.0;
            }
            value
        };

        Vec3::new(
            axis(KeyCode::KeyD, KeyCode::KeyA),
            axis(KeyCode::KeyQ, KeyCode::KeyE),
            axis(KeyCode::KeyS, KeyCode::KeyW),
        )
    }
}
