pub mod error;
pub mod kernel;

pub mod cpu {
    pub mod particles;
    pub mod plugin;
}

pub mod gpu {
    pub mod ffi;
    pub mod buffers;
    pub mod pipeline;
    pub mod readback;
}
