use serde::{Deserialize, Serialize};

use crate::pool::{PoolError, RenderTargetPool, TargetResolution, DEFAULT_POOL_SIZE};
use crate::renderer::{RenderSettings, DEFAULT_RECURSION_DEPTH, MAX_RECURSION_DEPTH};

pub const MIN_ANISOTROPY: u16 = 1;
pub const MAX_ANISOTROPY: u16 = 16;
pub const MIN_MOUSE_SENSITIVITY: f32 = 0.01;
pub const MAX_MOUSE_SENSITIVITY: f32 = 1.0;
pub const MIN_MOVE_SPEED: f32 = 0.5;
pub const MAX_MOVE_SPEED: f32 = 10.0;
pub const MIN_FOV: f32 = 1.0;
pub const MAX_FOV: f32 = 90.0;
pub const MIN_POOL_SIZE: usize = 1;
pub const MAX_POOL_SIZE: usize = 8;

/// Persisted viewer tunables. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerSettings {
    #[serde(default = "default_recursion_depth")]
    pub recursion_depth: u32,
    #[serde(default = "default_anisotropy")]
    pub anisotropy: u16,
    #[serde(default = "default_mouse_sensitivity")]
    pub mouse_sensitivity: f32,
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
    /// Vertical field of view in degrees.
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub target_resolution: TargetResolution,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            recursion_depth: default_recursion_depth(),
            anisotropy: default_anisotropy(),
            mouse_sensitivity: default_mouse_sensitivity(),
            move_speed: default_move_speed(),
            fov: default_fov(),
            pool_size: default_pool_size(),
            target_resolution: TargetResolution::default(),
        }
    }
}

impl ViewerSettings {
    pub fn sanitize(mut self) -> Self {
        self.recursion_depth = self.recursion_depth.min(MAX_RECURSION_DEPTH);
        self.anisotropy = self.anisotropy.clamp(MIN_ANISOTROPY, MAX_ANISOTROPY);
        self.mouse_sensitivity = clamp_or_default(
            self.mouse_sensitivity,
            MIN_MOUSE_SENSITIVITY,
            MAX_MOUSE_SENSITIVITY,
            default_mouse_sensitivity(),
        );
        self.move_speed = clamp_or_default(
            self.move_speed,
            MIN_MOVE_SPEED,
            MAX_MOVE_SPEED,
            default_move_speed(),
        );
        self.fov = clamp_or_default(self.fov, MIN_FOV, MAX_FOV, default_fov());
        self.pool_size = self.pool_size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE);
        // Scaled and fixed policies are rejected independently of the screen size.
        if self.target_resolution.resolve(1, 1).is_err() {
            self.target_resolution = TargetResolution::default();
        }
        self
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            recursion_depth: self.recursion_depth.min(MAX_RECURSION_DEPTH),
            ..RenderSettings::default()
        }
    }

    pub fn target_pool(&self) -> Result<RenderTargetPool, PoolError> {
        RenderTargetPool::new(self.pool_size, self.target_resolution)
    }
}

fn clamp_or_default(value: f32, min: f32, max: f32, default: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        default
    }
}

fn default_recursion_depth() -> u32 {
    DEFAULT_RECURSION_DEPTH
}

fn default_anisotropy() -> u16 {
    MAX_ANISOTROPY
}

fn default_mouse_sensitivity() -> f32 {
    0.1
}

fn default_move_speed() -> f32 {
    2.5
}

fn default_fov() -> f32 {
    45.0
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

#[cfg(test)]
mod tests {
    use super::{ViewerSettings, MAX_ANISOTROPY, MAX_FOV, MAX_POOL_SIZE, MIN_MOVE_SPEED};
    use crate::pool::TargetResolution;
    use crate::renderer::MAX_RECURSION_DEPTH;

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let settings = ViewerSettings {
            recursion_depth: 64,
            anisotropy: 0,
            mouse_sensitivity: 5.0,
            move_speed: 0.0,
            fov: 170.0,
            pool_size: 0,
            target_resolution: TargetResolution::MatchScreen,
        }
        .sanitize();

        assert_eq!(settings.recursion_depth, MAX_RECURSION_DEPTH);
        assert_eq!(settings.anisotropy, 1);
        assert_eq!(settings.mouse_sensitivity, 1.0);
        assert_eq!(settings.move_speed, MIN_MOVE_SPEED);
        assert_eq!(settings.fov, MAX_FOV);
        assert_eq!(settings.pool_size, 1);

        let settings = ViewerSettings {
            anisotropy: 99,
            pool_size: 99,
            fov: f32::NAN,
            ..ViewerSettings::default()
        }
        .sanitize();
        assert_eq!(settings.anisotropy, MAX_ANISOTROPY);
        assert_eq!(settings.pool_size, MAX_POOL_SIZE);
        assert_eq!(settings.fov, ViewerSettings::default().fov);
    }

    #[test]
    fn unusable_target_resolutions_reset_to_match_screen() {
        for resolution in [
            TargetResolution::Scaled { factor: 0.0 },
            TargetResolution::Scaled { factor: f32::INFINITY },
            TargetResolution::Fixed {
                width: 0,
                height: 512,
            },
            TargetResolution::Fixed {
                width: 100_000,
                height: 512,
            },
        ] {
            let settings = ViewerSettings {
                target_resolution: resolution,
                ..ViewerSettings::default()
            }
            .sanitize();
            assert_eq!(settings.target_resolution, TargetResolution::MatchScreen);
        }

        let kept = ViewerSettings {
            target_resolution: TargetResolution::Scaled { factor: 0.5 },
            ..ViewerSettings::default()
        }
        .sanitize();
        assert_eq!(
            kept.target_resolution,
            TargetResolution::Scaled { factor: 0.5 }
        );
    }

    #[test]
    fn defaults_build_a_renderer_configuration() {
        let settings = ViewerSettings::default();
        assert_eq!(settings.render_settings().recursion_depth, 3);
        let pool = settings.target_pool().unwrap();
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.resolution(), TargetResolution::MatchScreen);
    }
}
