//! Structured point cloud in the PointCloud2 layout.
//!
//! One row (`height == 1`), `width` points, each point three little-endian
//! `f32` fields `x`, `y`, `z` at offsets 0, 4 and 8.

use nalgebra::Vector3;

use crate::system::messages::Stamp;

/// `PointField` datatype code for 32-bit floats.
pub const FLOAT32: u8 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: u8,
    pub count: u32,
}

impl PointField {
    fn float32(name: &str, offset: u32) -> Self {
        Self {
            name: name.to_string(),
            offset,
            datatype: FLOAT32,
            count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub frame_id: String,
    pub stamp: Stamp,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Vec<u8>,
    pub is_dense: bool,
}

impl PointCloud {
    pub const POINT_STEP: u32 = 12;

    pub fn from_points(points: &[Vector3<f32>], frame_id: &str, stamp: Stamp) -> Self {
        let mut data = Vec::with_capacity(points.len() * Self::POINT_STEP as usize);
        for p in points {
            data.extend_from_slice(&p.x.to_le_bytes());
            data.extend_from_slice(&p.y.to_le_bytes());
            data.extend_from_slice(&p.z.to_le_bytes());
        }
        let width = points.len() as u32;
        Self {
            frame_id: frame_id.to_string(),
            stamp,
            height: 1,
            width,
            fields: vec![
                PointField::float32("x", 0),
                PointField::float32("y", 4),
                PointField::float32("z", 8),
            ],
            is_bigendian: false,
            point_step: Self::POINT_STEP,
            row_step: Self::POINT_STEP * width,
            data,
            is_dense: true,
        }
    }

    pub fn len(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded points in storage order.
    pub fn points(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.data
            .chunks_exact(self.point_step as usize)
            .map(|c| Vector3::new(read_f32(&c[0..4]), read_f32(&c[4..8]), read_f32(&c[8..12])))
    }

    /// New cloud with the same header holding only the points at `indices`.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        let step = self.point_step as usize;
        let mut data = Vec::with_capacity(indices.len() * step);
        for &i in indices {
            data.extend_from_slice(&self.data[i * step..(i + 1) * step]);
        }
        let width = indices.len() as u32;
        PointCloud {
            width,
            height: 1,
            row_step: self.point_step * width,
            data,
            ..self.clone_header()
        }
    }

    fn clone_header(&self) -> PointCloud {
        PointCloud {
            frame_id: self.frame_id.clone(),
            stamp: self.stamp,
            height: self.height,
            width: 0,
            fields: self.fields.clone(),
            is_bigendian: self.is_bigendian,
            point_step: self.point_step,
            row_step: 0,
            data: Vec::new(),
            is_dense: self.is_dense,
        }
    }
}

fn read_f32(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let cloud = PointCloud::from_points(
            &[Vector3::new(1.0, 2.0, 3.0), Vector3::new(-4.0, 0.5, 0.0)],
            "point_cloud",
            Stamp::new(3, 0),
        );
        assert_eq!(cloud.width, 2);
        assert_eq!(cloud.height, 1);
        assert_eq!(cloud.row_step, 24);
        assert_eq!(cloud.data.len(), 24);
        assert_eq!(&cloud.data[0..4], &1.0f32.to_le_bytes());
        assert_eq!(
            cloud.fields.iter().map(|f| (f.name.as_str(), f.offset)).collect::<Vec<_>>(),
            vec![("x", 0), ("y", 4), ("z", 8)]
        );
        let pts: Vec<_> = cloud.points().collect();
        assert_eq!(pts[1], Vector3::new(-4.0, 0.5, 0.0));
    }

    #[test]
    fn test_empty_cloud() {
        let cloud = PointCloud::from_points(&[], "point_cloud", Stamp::default());
        assert_eq!(cloud.width, 0);
        assert!(cloud.is_empty());
        assert_eq!(cloud.points().count(), 0);
    }

    #[test]
    fn test_select_keeps_header() {
        let pts: Vec<Vector3<f32>> = (0..5).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect();
        let cloud = PointCloud::from_points(&pts, "pc", Stamp::new(7, 1));
        let sub = cloud.select(&[4, 1]);
        assert_eq!(sub.frame_id, "pc");
        assert_eq!(sub.stamp, Stamp::new(7, 1));
        assert_eq!(sub.width, 2);
        assert_eq!(sub.row_step, 24);
        let xs: Vec<f32> = sub.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![4.0, 1.0]);
    }
}
