pub mod camera;
pub mod crossing;
pub mod draw;
pub mod frame;
pub mod geometry;
pub mod pool;
pub mod projection;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;
