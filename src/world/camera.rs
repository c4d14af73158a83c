use glam::Vec3;

/// Index of each component in an `angles` vector (degrees).
pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

/// Viewer in world space.
///
/// * `angles` are `[pitch, yaw, roll]` in degrees; yaw 0 looks down +X.
/// * `origin` is the eye position, not the feet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    origin: Vec3,
    angles: Vec3,
}

impl Camera {
    pub fn new(origin: Vec3, angles: Vec3) -> Self {
        Self { origin, angles }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn angles(&self) -> Vec3 {
        self.angles
    }

    /*──────────────────────── derived vectors ───────────────────────*/

    /// `(forward, right, up)` for the current angles.
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        angle_vectors(self.angles)
    }

    /// Unit vector on the X-Y plane the camera is heading along.
    #[inline]
    pub fn heading(&self) -> Vec3 {
        let (s, c) = self.angles[YAW].to_radians().sin_cos();
        Vec3::new(c, s, 0.0)
    }

    /*──────────────────────── movement helpers ──────────────────────*/

    /// Move by `forward` along the heading and `side` to the right, keeping
    /// the eye height.
    pub fn step(&mut self, forward: f32, side: f32) {
        let f = self.heading();
        let r = Vec3::new(f.y, -f.x, 0.0);
        self.origin += f * forward + r * side;
    }

    /// Raise or lower the eye.
    pub fn lift(&mut self, dz: f32) {
        self.origin.z += dz;
    }

    /// Turn around Z (positive = left), degrees.
    pub fn turn(&mut self, delta_yaw: f32) {
        self.angles[YAW] = (self.angles[YAW] + delta_yaw).rem_euclid(360.0);
    }
}

/// Forward, right and up vectors for `[pitch, yaw, roll]` in degrees.
pub fn angle_vectors(angles: Vec3) -> (Vec3, Vec3, Vec3) {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let (sr, cr) = angles[ROLL].to_radians().sin_cos();

    let forward = Vec3::new(cp * cy, cp * sy, -sp);
    let right = Vec3::new(
        -sr * sp * cy + cr * sy,
        -sr * sp * sy - cr * cy,
        -sr * cp,
    );
    let up = Vec3::new(
        cr * sp * cy + sr * sy,
        cr * sp * sy - sr * cy,
        cr * cp,
    );
    (forward, right, up)
}

/*====================================================================*/
/*                                Tests                                */
/*====================================================================*/
