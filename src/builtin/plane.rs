use anyhow::Context as _;

use crate::filter::Renderable;

/// Single-channel CPU image. The pixel buffer only exists while allocated.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    width: u32,
    height: u32,
    data: Option<Vec<f32>>,
}

impl Plane {
    /// Unallocated plane of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: None,
        }
    }

    /// Allocated plane with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            data: Some(vec![value; len]),
        }
    }

    /// Allocated plane over row-major `data`.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> anyhow::Result<Self> {
        let len = width as usize * height as usize;
        if data.len() != len {
            anyhow::bail!(
                "plane {width}x{height} needs {len} pixels, got {}",
                data.len()
            );
        }
        Ok(Self {
            width,
            height,
            data: Some(data),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// `true` for a zero-sized plane.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once pixel storage exists.
    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// Unallocated plane with the same size.
    pub fn like(&self) -> Self {
        Self::new(self.width, self.height)
    }

    /// `true` when `other` has the same dimensions.
    pub fn same_size(&self, other: &Plane) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Pixel values, row-major. Fails while unallocated.
    pub fn pixels(&self) -> anyhow::Result<&[f32]> {
        self.data
            .as_deref()
            .context("plane pixels read while unallocated")
    }

    /// Mutable pixel values. Fails while unallocated.
    pub fn pixels_mut(&mut self) -> anyhow::Result<&mut [f32]> {
        self.data
            .as_deref_mut()
            .context("plane pixels written while unallocated")
    }
}

impl Renderable for Plane {
    fn allocate(&mut self) -> anyhow::Result<()> {
        if self.data.is_none() {
            self.data = Some(vec![0.0; self.len()]);
        }
        Ok(())
    }

    fn deallocate(&mut self) {
        self.data = None;
    }
}
