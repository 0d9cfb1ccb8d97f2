pub mod paste;
pub mod stop;

pub use paste::{ClipboardPaster, ImageSender};
pub use stop::CancelToken;
#[cfg(target_os = "linux")]
pub use stop::StopListener;
