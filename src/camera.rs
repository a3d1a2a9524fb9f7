use glam::{Mat4, Vec3};

/// A perspective camera for 3D scenes.
///
/// Provides position, orientation, vertical field of view and clip planes.
/// The renderer only draws meshes while a camera is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub fov: f32, // radians
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, target_x: f32, target_y: f32, target_z: f32) -> Self {
        let target = Vec3::new(target_x, target_y, target_z);
        self.forward = (target - self.position).normalize_or_zero();
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Compute the right vector from forward and up.
    pub fn right(&self) -> Vec3 {
        self.forward.cross(self.up).normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// The uniform block uploaded once per frame to every technique.
    pub fn uniform(&self, aspect: f32) -> CameraUniform {
        CameraUniform {
            view: self.view().to_cols_array_2d(),
            proj: self.projection(aspect).to_cols_array_2d(),
        }
    }
}

/// GPU layout of the camera uniform (group 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY.to_cols_array_2d(),
            proj: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fov_is_45_degrees() {
        assert!((Camera::default().fov - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn view_moves_eye_to_origin() {
        let camera = Camera::new().at(0.0, 0.0, 5.0);
        let eye = camera.view().transform_point3(camera.position);
        assert!(eye.length() < 1e-5);
    }

    #[test]
    fn uniform_is_two_matrices() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
    }
}
