//! Backend-neutral kernel instantiation: templates, injectors and kernels.

pub mod buffer_injector;
pub mod kernel;
pub mod kernel_name;
pub mod template;

pub use buffer_injector::{
    BufferBinding, BufferInjector, BufferValue, META_BUFFER_NAME, UnresolvedValue,
};
pub use kernel::Kernel;
pub use kernel_name::KernelNameInjector;
pub use template::{Segment, Template};
