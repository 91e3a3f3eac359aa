//! Host surfaces and their teardown notifications
mod subscription;
mod surface;

pub use subscription::Subscription;
pub use surface::{DestroyCallback, Margins, Surface, SurfaceId};
