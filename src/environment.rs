//! Skybox cube maps for the two universes and the post-integration choice
//! between them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat3, Vec3};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{Result, WormholeError};

/// Flow rate of universe B relative to A.
pub const FLOW_RATIO_B: f32 = 0.7;

/// Cube faces in upload order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Face hit by `dir` plus its (s, t) texture coordinates in [0, 1].
    pub fn project(dir: Vec3) -> (CubeFace, f32, f32) {
        let a = dir.abs();
        let (face, sc, tc, ma) = if a.x >= a.y && a.x >= a.z {
            if dir.x >= 0.0 {
                (CubeFace::PosX, -dir.z, -dir.y, a.x)
            } else {
                (CubeFace::NegX, dir.z, -dir.y, a.x)
            }
        } else if a.y >= a.z {
            if dir.y >= 0.0 {
                (CubeFace::PosY, dir.x, dir.z, a.y)
            } else {
                (CubeFace::NegY, dir.x, -dir.z, a.y)
            }
        } else if dir.z >= 0.0 {
            (CubeFace::PosZ, dir.x, -dir.y, a.z)
        } else {
            (CubeFace::NegZ, -dir.x, -dir.y, a.z)
        };
        if ma <= 0.0 {
            return (CubeFace::PosX, 0.5, 0.5);
        }
        (face, 0.5 * (sc / ma + 1.0), 0.5 * (tc / ma + 1.0))
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// File naming schemes a skybox folder may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceNaming {
    /// right, left, top, bottom, front, back
    Descriptive,
    /// px, nx, py, ny, pz, nz
    Axis,
}

impl FaceNaming {
    pub fn file_names(self) -> [&'static str; 6] {
        match self {
            FaceNaming::Descriptive => [
                "right.png",
                "left.png",
                "top.png",
                "bottom.png",
                "front.png",
                "back.png",
            ],
            FaceNaming::Axis => ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"],
        }
    }

    /// Pick the scheme whose first face exists in `dir`.
    pub fn detect(dir: &Path) -> Result<Self> {
        [FaceNaming::Descriptive, FaceNaming::Axis]
            .into_iter()
            .find(|naming| dir.join(naming.file_names()[0]).is_file())
            .ok_or_else(|| WormholeError::UnknownFaceNaming { path: dir.to_path_buf() })
    }
}

/// Directional lookup over six equally sized faces.
#[derive(Clone, Debug)]
pub struct EnvironmentMap {
    faces: [RgbaImage; 6],
}

impl EnvironmentMap {
    /// Faces in +X, -X, +Y, -Y, +Z, -Z order. The first face must be square;
    /// faces that do not match its size are resized to it.
    pub fn from_faces(faces: [RgbaImage; 6]) -> Result<Self> {
        let (w, h) = faces[0].dimensions();
        if w == 0 || h == 0 {
            return Err(WormholeError::InvalidResolution { width: w, height: h });
        }
        if w != h {
            return Err(WormholeError::NonSquareFace { width: w, height: h });
        }
        let faces = faces.map(|face| {
            if face.dimensions() == (w, h) {
                face
            } else {
                log::warn!("resizing cube face from {:?} to {}x{}", face.dimensions(), w, h);
                imageops::resize(&face, w, h, FilterType::Triangle)
            }
        });
        Ok(Self { faces })
    }

    /// Uniform colour in every direction.
    pub fn solid(color: [u8; 4]) -> Self {
        Self::from_colors([color; 6])
    }

    /// One flat colour per face, mostly useful for tests and previews.
    pub fn from_colors(colors: [[u8; 4]; 6]) -> Self {
        Self {
            faces: colors.map(|c| RgbaImage::from_pixel(2, 2, Rgba(c))),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.faces[0].dimensions()
    }

    pub fn face(&self, face: CubeFace) -> &RgbaImage {
        &self.faces[face.index()]
    }

    /// Bilinear lookup, RGBA in [0, 1].
    pub fn sample(&self, dir: Vec3) -> [f32; 4] {
        let (face, s, t) = CubeFace::project(dir);
        let img = self.face(face);
        let (w, h) = img.dimensions();

        let fx = (s * w as f32 - 0.5).clamp(0.0, (w - 1) as f32);
        let fy = (t * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);

        let texel = |x: u32, y: u32| img.get_pixel(x, y).0.map(|c| c as f32 / 255.0);
        let (p00, p10, p01, p11) = (texel(x0, y0), texel(x1, y0), texel(x0, y1), texel(x1, y1));
        std::array::from_fn(|i| {
            let top = p00[i] + (p10[i] - p00[i]) * tx;
            let bottom = p01[i] + (p11[i] - p01[i]) * tx;
            top + (bottom - top) * ty
        })
    }
}

/// Load a six-face skybox from a folder.
pub fn load_environment(dir: impl AsRef<Path>) -> Result<EnvironmentMap> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(WormholeError::MissingEnvironment { path: dir.to_path_buf() });
    }
    let naming = FaceNaming::detect(dir)?;
    log::info!("Loading skybox {} ({:?} face names)", dir.display(), naming);

    let paths: Vec<PathBuf> = naming.file_names().iter().map(|name| dir.join(name)).collect();
    let mut faces = Vec::with_capacity(6);
    for path in paths {
        if !path.is_file() {
            return Err(WormholeError::MissingFace { path });
        }
        let img = image::open(&path).map_err(|source| WormholeError::Image {
            path: path.clone(),
            source,
        })?;
        faces.push(img.to_rgba8());
    }
    let faces: [RgbaImage; 6] = faces
        .try_into()
        .map_err(|_| WormholeError::UnknownFaceNaming { path: dir.to_path_buf() })?;
    EnvironmentMap::from_faces(faces)
}

/// Which side of the throat a ray ended up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Universe {
    A,
    B,
}

impl Universe {
    pub fn from_flare(l: f32) -> Self {
        if l >= 0.0 {
            Universe::A
        } else {
            Universe::B
        }
    }
}

/// Rotation about the world vertical axis, `x' = c x - s z`, `z' = s x + c z`.
pub fn rotation_y(angle: f32) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::from_cols(Vec3::new(c, 0.0, s), Vec3::Y, Vec3::new(-s, 0.0, c))
}

/// Chooses and samples the background for a finished ray. Both maps are
/// shared read-only between all pixel tasks.
#[derive(Clone, Debug)]
pub struct EnvironmentSelector {
    a: Arc<EnvironmentMap>,
    b: Arc<EnvironmentMap>,
    flow_speed: f32,
}

impl EnvironmentSelector {
    pub fn new(a: Arc<EnvironmentMap>, b: Arc<EnvironmentMap>, flow_speed: f32) -> Self {
        Self { a, b, flow_speed }
    }

    pub fn map(&self, universe: Universe) -> &EnvironmentMap {
        match universe {
            Universe::A => &self.a,
            Universe::B => &self.b,
        }
    }

    /// Flow-rotated sampling direction for a universe at `time`.
    pub fn flow_direction(&self, universe: Universe, dir: Vec3, time: f32) -> Vec3 {
        let angle = match universe {
            Universe::A => time * self.flow_speed,
            Universe::B => -time * self.flow_speed * FLOW_RATIO_B,
        };
        rotation_y(angle) * dir
    }

    pub fn select(&self, l_final: f32, dir: Vec3, time: f32) -> (Universe, Vec3) {
        let universe = Universe::from_flare(l_final);
        (universe, self.flow_direction(universe, dir, time))
    }

    pub fn sample(&self, l_final: f32, dir: Vec3, time: f32) -> [f32; 4] {
        let (universe, dir) = self.select(l_final, dir, time);
        self.map(universe).sample(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const FACE_COLORS: [[u8; 4]; 6] = [
        [255, 0, 0, 255],
        [0, 255, 0, 255],
        [0, 0, 255, 255],
        [255, 255, 0, 255],
        [0, 255, 255, 255],
        [255, 0, 255, 255],
    ];

    fn to_unit(c: [u8; 4]) -> [f32; 4] {
        c.map(|v| v as f32 / 255.0)
    }

    #[test]
    fn axis_directions_hit_their_faces() {
        let map = EnvironmentMap::from_colors(FACE_COLORS);
        let dirs = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        for (dir, color) in dirs.into_iter().zip(FACE_COLORS) {
            assert_eq!(map.sample(dir), to_unit(color), "{dir:?}");
        }
    }

    #[test]
    fn projection_centres_axis_directions() {
        for (face, dir) in CubeFace::ALL
            .into_iter()
            .zip([Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z])
        {
            let (hit, s, t) = CubeFace::project(dir * 3.0);
            assert_eq!(hit, face);
            assert_abs_diff_eq!(s, 0.5);
            assert_abs_diff_eq!(t, 0.5);
        }
    }

    #[test]
    fn zero_direction_samples_a_face_centre() {
        let (face, s, t) = CubeFace::project(Vec3::ZERO);
        assert_eq!((face, s, t), (CubeFace::PosX, 0.5, 0.5));
    }

    #[test]
    fn bilinear_blends_between_texels() {
        let mut face = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        face.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        face.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let faces = std::array::from_fn(|_| face.clone());
        let map = EnvironmentMap::from_faces(faces).unwrap();
        // +Z face centre lies halfway between the two texels.
        let c = map.sample(Vec3::Z);
        assert_abs_diff_eq!(c[0], 0.5, epsilon = 1e-6);
        assert_eq!(c[3], 1.0);
    }

    #[test]
    fn mismatched_faces_are_resized() {
        let mut faces: [RgbaImage; 6] = std::array::from_fn(|_| RgbaImage::new(4, 4));
        faces[3] = RgbaImage::new(8, 2);
        let map = EnvironmentMap::from_faces(faces).unwrap();
        for face in CubeFace::ALL {
            assert_eq!(map.face(face).dimensions(), (4, 4));
        }
    }

    #[test]
    fn non_square_faces_are_rejected() {
        let faces: [RgbaImage; 6] = std::array::from_fn(|_| RgbaImage::new(8, 2));
        match EnvironmentMap::from_faces(faces).unwrap_err() {
            WormholeError::NonSquareFace { width, height } => assert_eq!((width, height), (8, 2)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rotation_matches_shader_convention() {
        let r = rotation_y(std::f32::consts::FRAC_PI_2) * Vec3::X;
        assert_abs_diff_eq!(r.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.z, 1.0, epsilon = 1e-6);
        assert_eq!(rotation_y(0.0) * Vec3::new(0.3, 0.4, 0.5), Vec3::new(0.3, 0.4, 0.5));
    }

    #[test]
    fn sign_of_flare_picks_universe() {
        assert_eq!(Universe::from_flare(0.0), Universe::A);
        assert_eq!(Universe::from_flare(12.0), Universe::A);
        assert_eq!(Universe::from_flare(-0.001), Universe::B);
    }

    #[test]
    fn universes_flow_in_opposite_directions() {
        let a = Arc::new(EnvironmentMap::solid([255, 0, 0, 255]));
        let b = Arc::new(EnvironmentMap::solid([0, 0, 255, 255]));
        let selector = EnvironmentSelector::new(a, b, 0.03);
        let t = 10.0;

        let (ua, da) = selector.select(1.0, Vec3::X, t);
        let (ub, db) = selector.select(-1.0, Vec3::X, t);
        assert_eq!(ua, Universe::A);
        assert_eq!(ub, Universe::B);
        assert_abs_diff_eq!(da.z, (0.3f32).sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(db.z, (-0.21f32).sin(), epsilon = 1e-6);

        assert_eq!(selector.sample(1.0, Vec3::X, t), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(selector.sample(-1.0, Vec3::X, t), [0.0, 0.0, 1.0, 1.0]);
    }

    fn write_faces(dir: &Path, names: &[&str], size: u32) {
        write_face_rects(dir, names, size, size);
    }

    fn write_face_rects(dir: &Path, names: &[&str], width: u32, height: u32) {
        for name in names {
            RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))
                .save(dir.join(name))
                .unwrap();
        }
    }

    #[test]
    fn loads_both_naming_conventions() {
        for naming in [FaceNaming::Descriptive, FaceNaming::Axis] {
            let tmp = tempfile::tempdir().unwrap();
            write_faces(tmp.path(), &naming.file_names(), 4);
            assert_eq!(FaceNaming::detect(tmp.path()).unwrap(), naming);
            let map = load_environment(tmp.path()).unwrap();
            assert_eq!(map.dimensions(), (4, 4));
            assert_abs_diff_eq!(map.sample(Vec3::Y)[2], 30.0 / 255.0);
        }
    }

    #[test]
    fn missing_folder_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_environment(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, WormholeError::MissingEnvironment { .. }));
    }

    #[test]
    fn unknown_naming_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write_faces(tmp.path(), &["sky.png"], 4);
        let err = load_environment(tmp.path()).unwrap_err();
        assert!(matches!(err, WormholeError::UnknownFaceNaming { .. }));
    }

    #[test]
    fn missing_face_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write_faces(tmp.path(), &FaceNaming::Axis.file_names()[..5], 4);
        match load_environment(tmp.path()).unwrap_err() {
            WormholeError::MissingFace { path } => assert!(path.ends_with("nz.png")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mismatched_face_files_are_resized_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let names = FaceNaming::Descriptive.file_names();
        write_faces(tmp.path(), &names[..5], 8);
        write_faces(tmp.path(), &names[5..], 3);
        let map = load_environment(tmp.path()).unwrap();
        assert_eq!(map.face(CubeFace::NegZ).dimensions(), (8, 8));
    }

    #[test]
    fn non_square_face_files_fail_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        write_face_rects(tmp.path(), &FaceNaming::Axis.file_names(), 16, 4);
        let err = load_environment(tmp.path()).unwrap_err();
        assert!(matches!(err, WormholeError::NonSquareFace { width: 16, height: 4 }));
    }
}
