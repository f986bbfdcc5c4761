mod cpu;
mod runtime;

pub use cpu::CpuRuntime;
pub use runtime::{BufferHandle, DeviceRuntime};
