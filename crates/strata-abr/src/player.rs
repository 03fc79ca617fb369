//! Player buffer collaborator.

/// The slice of player state the engine touches: the maximum buffer
/// size, read once and rescaled when the manifest arrives.
pub trait PlayerState {
    /// Maximum buffer size. Counted in segments until the engine
    /// rescales it to seconds at manifest time.
    fn max_buffer_size(&self) -> f64;
    fn set_max_buffer_size(&mut self, size: f64);
}

/// Plain in-memory player state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerBuffer {
    max_buffer_size: f64,
}

impl PlayerBuffer {
    pub fn new(max_buffer_size: f64) -> Self {
        PlayerBuffer { max_buffer_size }
    }
}

impl Default for PlayerBuffer {
    fn default() -> Self {
        PlayerBuffer::new(60.0)
    }
}

impl PlayerState for PlayerBuffer {
    fn max_buffer_size(&self) -> f64 {
        self.max_buffer_size
    }

    fn set_max_buffer_size(&mut self, size: f64) {
        self.max_buffer_size = size;
    }
}
