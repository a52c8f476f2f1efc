//! Point vertex format
//!
//! Each point is a fixed 16-byte record: three `f32` position components
//! followed by four `u8` color channels (RGBA). The struct is `#[repr(C)]` so
//! the same memory can be handed over from C callers unchanged.

use bytemuck::{Pod, Zeroable};

/// Size of one [`Vertex`] in bytes
pub const VERTEX_SIZE: usize = 16;

/// One point of a point cloud.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position (x, y, z) in model space
    pub position: [f32; 3],
    /// Color (r, g, b, a), normalized to `[0, 1]` on the GPU
    pub color: [u8; 4],
}

const _: () = assert!(std::mem::size_of::<Vertex>() == VERTEX_SIZE);

impl Vertex {
    /// Create a vertex from a position and an RGBA color
    pub const fn new(position: [f32; 3], color: [u8; 4]) -> Self {
        Self { position, color }
    }

    /// Reinterpret a vertex slice as the bytes uploaded to the GPU.
    pub fn slice_as_bytes(vertices: &[Self]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            color: [192, 192, 192, 255],
        }
    }
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// 32-bit float
    Float,
    /// Unsigned byte
    UnsignedByte,
}

/// Description of one shader input fed from the vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Number of components (1-4)
    pub components: i32,
    /// Component type
    pub component_type: ComponentType,
    /// Whether integer components are normalized to `[0, 1]`
    pub normalized: bool,
    /// Byte offset of the attribute within a vertex
    pub offset: i32,
}

/// Vertex layout of the point pipeline
pub struct PointVertexLayout;

impl PointVertexLayout {
    /// Byte distance between consecutive vertices
    pub const STRIDE: i32 = VERTEX_SIZE as i32;

    /// Attribute descriptions, position at location 0 and color at location 1
    pub const fn attributes() -> [VertexAttribute; 2] {
        [
            VertexAttribute {
                location: 0,
                components: 3,
                component_type: ComponentType::Float,
                normalized: false,
                offset: 0,
            },
            VertexAttribute {
                location: 1,
                components: 4,
                component_type: ComponentType::UnsignedByte,
                normalized: true,
                offset: 12, // after 3 * sizeof(f32)
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vertex_is_grey_origin() {
        let vertex = Vertex::default();
        assert_eq!(vertex.position, [0.0; 3]);
        assert_eq!(vertex.color, [192, 192, 192, 255]);
    }

    #[test]
    #[cfg(target_endian = "little")]
    fn test_byte_layout() {
        let vertices = [Vertex::new([1.0, -2.5, 3.0], [10, 20, 30, 40])];
        let bytes = Vertex::slice_as_bytes(&vertices);

        assert_eq!(bytes.len(), VERTEX_SIZE);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
        assert_eq!(&bytes[8..12], &3.0f32.to_le_bytes());
        assert_eq!(&bytes[12..], &[10, 20, 30, 40]);
    }

    #[test]
    fn test_layout_matches_struct() {
        let [position, color] = PointVertexLayout::attributes();

        assert_eq!(position.offset as usize, std::mem::offset_of!(Vertex, position));
        assert_eq!(color.offset as usize, std::mem::offset_of!(Vertex, color));
        assert_eq!(PointVertexLayout::STRIDE as usize, std::mem::size_of::<Vertex>());
        assert!(color.normalized);
        assert_eq!(color.component_type, ComponentType::UnsignedByte);
    }
}
