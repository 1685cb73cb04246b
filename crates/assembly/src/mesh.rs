//! In-memory triangle meshes loaded from STL (ASCII or binary).

use forgebom_core::MeshError;
use nalgebra::{Isometry3, Point3};
use std::path::Path;

const BINARY_HEADER_LEN: usize = 80;
const BINARY_FACET_LEN: usize = 50;

pub type Triangle = [Point3<f64>; 3];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// Load an STL file from disk.
    pub async fn load(path: &Path) -> Result<Self, MeshError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| MeshError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse_stl(&bytes)
    }

    /// Parse STL bytes, detecting ASCII vs binary.
    ///
    /// Binary files may also start with `solid`, so ASCII additionally
    /// requires valid UTF-8 that either has a `facet` keyword or no NUL bytes.
    pub fn parse_stl(bytes: &[u8]) -> Result<Self, MeshError> {
        let looks_ascii = bytes.trim_ascii_start().starts_with(b"solid")
            && std::str::from_utf8(bytes)
                .is_ok_and(|s| s.contains("facet") || !s.contains('\0'));
        if looks_ascii {
            Self::parse_ascii(bytes)
        } else {
            Self::parse_binary(bytes)
        }
    }

    fn parse_ascii(bytes: &[u8]) -> Result<Self, MeshError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MeshError::InvalidStl(format!("not UTF-8: {e}")))?;

        let mut triangles = Vec::new();
        let mut pending: Vec<Point3<f64>> = Vec::with_capacity(3);
        for line in text.lines() {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("vertex") => {
                    let coords: Vec<f64> = words
                        .map(|w| w.parse::<f64>())
                        .collect::<Result<_, _>>()
                        .map_err(|e| MeshError::InvalidStl(format!("bad vertex '{line}': {e}")))?;
                    let [x, y, z] = coords[..] else {
                        return Err(MeshError::InvalidStl(format!("bad vertex '{line}'")));
                    };
                    pending.push(Point3::new(x, y, z));
                }
                Some("endloop") => {
                    let [a, b, c] = pending[..] else {
                        return Err(MeshError::InvalidStl(format!(
                            "facet with {} vertices",
                            pending.len()
                        )));
                    };
                    triangles.push([a, b, c]);
                    pending.clear();
                }
                _ => {}
            }
        }
        Ok(Self { triangles })
    }

    fn parse_binary(bytes: &[u8]) -> Result<Self, MeshError> {
        let count_bytes = bytes
            .get(BINARY_HEADER_LEN..BINARY_HEADER_LEN + 4)
            .ok_or_else(|| MeshError::InvalidStl("shorter than binary header".into()))?;
        let count =
            u32::from_le_bytes([count_bytes[0], count_bytes[1], count_bytes[2], count_bytes[3]])
                as usize;

        let body = &bytes[BINARY_HEADER_LEN + 4..];
        if body.len() < count * BINARY_FACET_LEN {
            return Err(MeshError::InvalidStl(format!(
                "header declares {count} facets but only {} bytes follow",
                body.len()
            )));
        }

        let triangles = body
            .chunks_exact(BINARY_FACET_LEN)
            .take(count)
            .map(|facet| {
                // 12 bytes of normal, then three vertices.
                let vertex = |i: usize| {
                    let at = 12 + i * 12;
                    Point3::new(
                        read_f32(facet, at),
                        read_f32(facet, at + 4),
                        read_f32(facet, at + 8),
                    )
                };
                [vertex(0), vertex(1), vertex(2)]
            })
            .collect();
        Ok(Self { triangles })
    }

    /// Local-space bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.triangles.iter().flatten().copied())
    }
}

fn read_f32(facet: &[u8], at: usize) -> f64 {
    f64::from(f32::from_le_bytes([
        facet[at],
        facet[at + 1],
        facet[at + 2],
        facet[at + 3],
    ]))
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Point3<f64>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |acc, p| Self {
                min: acc.min.inf(&p),
                max: acc.max.sup(&p),
            },
        ))
    }

    fn corners(&self) -> [Point3<f64>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// World-space bounds of this box after a rigid transform.
    pub fn transformed(&self, transform: &Isometry3<f64>) -> Self {
        let corners = self.corners().map(|c| transform * c);
        // Eight corners always yield a box.
        Self::from_points(corners).unwrap_or(*self)
    }

    /// Overlap test. Boxes closer than `tolerance` on every axis count as
    /// intersecting; with zero tolerance, faces that only touch do not.
    pub fn intersects(&self, other: &Aabb, tolerance: f64) -> bool {
        (0..3).all(|i| {
            self.min[i] < other.max[i] + tolerance && other.min[i] < self.max[i] + tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_FACET: &str = "solid cube\n\
        facet normal 0 0 -1\n\
          outer loop\n\
            vertex 0 0 0\n\
            vertex 10 0 0\n\
            vertex 10 10 2\n\
          endloop\n\
        endfacet\n\
        endsolid cube\n";

    fn binary_stl(triangles: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; BINARY_HEADER_LEN];
        bytes.extend_from_slice(&(triangles.len() as u32).to_le_bytes());
        for tri in triangles {
            bytes.extend_from_slice(&[0u8; 12]);
            for v in tri {
                for c in v {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&[0u8; 2]);
        }
        bytes
    }

    #[test]
    fn parses_ascii() {
        let mesh = Mesh::parse_stl(CUBE_FACET.as_bytes()).unwrap();
        assert_eq!(mesh.len(), 1);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.max, Point3::new(10.0, 10.0, 2.0));
    }

    #[test]
    fn parses_binary() {
        let bytes = binary_stl(&[
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 3.5]],
        ]);
        let mesh = Mesh::parse_stl(&bytes).unwrap();
        assert_eq!(mesh.len(), 2);
        assert_eq!(mesh.bounds().unwrap().max.z, 3.5);
    }

    #[test]
    fn binary_with_solid_header_is_still_binary() {
        let mut bytes = binary_stl(&[[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]]]);
        bytes[..5].copy_from_slice(b"solid");
        let mesh = Mesh::parse_stl(&bytes).unwrap();
        assert_eq!(mesh.len(), 1);
    }

    #[test]
    fn truncated_binary_rejected() {
        let mut bytes = binary_stl(&[[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]]);
        bytes.truncate(100);
        assert!(matches!(Mesh::parse_stl(&bytes), Err(MeshError::InvalidStl(_))));
        assert!(Mesh::parse_stl(b"nope").is_err());
    }

    #[test]
    fn empty_ascii_solid_is_empty() {
        let mesh = Mesh::parse_stl(b"solid empty\nendsolid empty\n").unwrap();
        assert!(mesh.is_empty());
        assert!(mesh.bounds().is_none());
    }

    #[test]
    fn bounds_follow_transform() {
        let bounds = Mesh::parse_stl(CUBE_FACET.as_bytes()).unwrap().bounds().unwrap();
        let moved = bounds.transformed(&Isometry3::translation(100.0, -5.0, 1.0));
        assert_eq!(moved.min, Point3::new(100.0, -5.0, 1.0));
        assert_eq!(moved.max, Point3::new(110.0, 5.0, 3.0));
    }

    #[test]
    fn touching_boxes_do_not_intersect_without_tolerance() {
        let a = Aabb::from_points([Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)]).unwrap();
        let b = Aabb::from_points([Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0)]).unwrap();
        assert!(!a.intersects(&b, 0.0));
        assert!(a.intersects(&b, 0.5));

        let c = Aabb::from_points([Point3::new(0.5, 0.5, 0.5), Point3::new(3.0, 3.0, 3.0)]).unwrap();
        assert!(a.intersects(&c, 0.0));
    }
}
