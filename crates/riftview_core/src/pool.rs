use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_POOL_SIZE: usize = 2;
pub const MAX_TARGET_DIMENSION: u32 = 8192;
const MIN_SCALE: f32 = 0.05;
const MAX_SCALE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How large each pooled target is relative to the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetResolution {
    MatchScreen,
    Scaled { factor: f32 },
    Fixed { width: u32, height: u32 },
}

impl Default for TargetResolution {
    fn default() -> Self {
        Self::MatchScreen
    }
}

impl TargetResolution {
    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> Result<Extent, PoolError> {
        if screen_width == 0 || screen_height == 0 {
            return Err(PoolError::EmptySurface {
                width: screen_width,
                height: screen_height,
            });
        }

        let extent = match *self {
            Self::MatchScreen => Extent::new(screen_width, screen_height),
            Self::Scaled { factor } => {
                if !factor.is_finite() || !(MIN_SCALE..=MAX_SCALE).contains(&factor) {
                    return Err(PoolError::UnsupportedScale(factor));
                }
                Extent::new(
                    scaled_dimension(screen_width, factor),
                    scaled_dimension(screen_height, factor),
                )
            }
            Self::Fixed { width, height } => Extent::new(width, height),
        };

        if extent.width == 0
            || extent.height == 0
            || extent.width > MAX_TARGET_DIMENSION
            || extent.height > MAX_TARGET_DIMENSION
        {
            return Err(PoolError::UnsupportedResolution(extent));
        }
        Ok(extent)
    }
}

fn scaled_dimension(dimension: u32, factor: f32) -> u32 {
    ((dimension.max(1) as f32) * factor).round().max(1.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoolError {
    EmptyPool,
    EmptySurface { width: u32, height: u32 },
    UnsupportedScale(f32),
    UnsupportedResolution(Extent),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPool => write!(f, "render target pool needs at least one target"),
            Self::EmptySurface { width, height } => {
                write!(f, "output surface {width}x{height} has no area")
            }
            Self::UnsupportedScale(factor) => {
                write!(f, "render target scale {factor} is outside {MIN_SCALE}..={MAX_SCALE}")
            }
            Self::UnsupportedResolution(extent) => write!(
                f,
                "render target resolution {extent} is outside 1..={MAX_TARGET_DIMENSION}"
            ),
        }
    }
}

impl std::error::Error for PoolError {}

/// Fixed set of offscreen color+depth targets handed out round-robin.
///
/// Only indices and sizes live here; the backend owns the GPU textures.
/// The cursor restarts at zero every frame and wraps modulo the pool size,
/// so deep or wide recursion reuses targets instead of growing the pool.
#[derive(Debug, Clone)]
pub struct RenderTargetPool {
    count: usize,
    cursor: usize,
    resolution: TargetResolution,
    extent: Option<Extent>,
}

impl RenderTargetPool {
    pub fn new(count: usize, resolution: TargetResolution) -> Result<Self, PoolError> {
        if count == 0 {
            return Err(PoolError::EmptyPool);
        }
        Ok(Self {
            count,
            cursor: 0,
            resolution,
            extent: None,
        })
    }

    /// Sizes the pool for a new output surface. Must run on every resize.
    pub fn init(&mut self, screen_width: u32, screen_height: u32) -> Result<Extent, PoolError> {
        let extent = self.resolution.resolve(screen_width, screen_height)?;
        if self.extent != Some(extent) {
            info!(
                "Portal target pool sized to {} x {extent} for {screen_width}x{screen_height} output",
                self.count
            );
        }
        self.extent = Some(extent);
        self.cursor = 0;
        Ok(extent)
    }

    pub fn begin_frame(&mut self) {
        self.cursor = 0;
    }

    pub fn acquire(&mut self) -> usize {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.count;
        index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// `None` until the first successful [`RenderTargetPool::init`].
    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    pub fn resolution(&self) -> TargetResolution {
        self.resolution
    }

    /// Takes effect on the next `init`.
    pub fn set_resolution(&mut self, resolution: TargetResolution) {
        self.resolution = resolution;
    }
}

#[cfg(test)]
mod tests {
    use super::{Extent, PoolError, RenderTargetPool, TargetResolution};

    #[test]
    fn acquire_walks_the_pool_in_order() {
        for count in 1..=4 {
            let mut pool = RenderTargetPool::new(count, TargetResolution::MatchScreen).unwrap();
            pool.init(640, 480).unwrap();
            let sequence: Vec<usize> = (0..count * 3).map(|_| pool.acquire()).collect();
            let expected: Vec<usize> = (0..count * 3).map(|i| i % count).collect();
            assert_eq!(sequence, expected);
        }
    }

    #[test]
    fn begin_frame_restarts_the_cursor() {
        let mut pool = RenderTargetPool::new(3, TargetResolution::MatchScreen).unwrap();
        pool.init(640, 480).unwrap();
        assert_eq!(pool.acquire(), 0);
        assert_eq!(pool.acquire(), 1);
        pool.begin_frame();
        assert_eq!(pool.acquire(), 0);
    }

    #[test]
    fn resolution_policies_resolve_against_the_screen() {
        assert_eq!(
            TargetResolution::MatchScreen.resolve(1280, 720),
            Ok(Extent::new(1280, 720))
        );
        assert_eq!(
            TargetResolution::Scaled { factor: 0.5 }.resolve(1281, 720),
            Ok(Extent::new(641, 360))
        );
        assert_eq!(
            TargetResolution::Fixed {
                width: 512,
                height: 512
            }
            .resolve(1280, 720),
            Ok(Extent::new(512, 512))
        );
    }

    #[test]
    fn unsupported_sizes_fail_initialization() {
        assert_eq!(
            RenderTargetPool::new(0, TargetResolution::MatchScreen).unwrap_err(),
            PoolError::EmptyPool
        );

        let mut pool = RenderTargetPool::new(2, TargetResolution::MatchScreen).unwrap();
        assert!(matches!(pool.init(0, 600), Err(PoolError::EmptySurface { .. })));
        assert!(pool.extent().is_none());

        pool.set_resolution(TargetResolution::Fixed {
            width: 0,
            height: 512,
        });
        assert!(matches!(
            pool.init(800, 600),
            Err(PoolError::UnsupportedResolution(_))
        ));

        pool.set_resolution(TargetResolution::Scaled { factor: f32::NAN });
        assert!(matches!(pool.init(800, 600), Err(PoolError::UnsupportedScale(_))));
    }

    #[test]
    fn resize_reinitializes_the_extent() {
        let mut pool = RenderTargetPool::new(2, TargetResolution::Scaled { factor: 0.5 }).unwrap();
        assert_eq!(pool.init(800, 600), Ok(Extent::new(400, 300)));
        assert_eq!(pool.init(1024, 768), Ok(Extent::new(512, 384)));
        assert_eq!(pool.extent(), Some(Extent::new(512, 384)));
    }
}
