//! Code in this submodule deals strictly with the extent
//! of images, stacks and volumes.

/// `ArrayDim` holds the extent of an image array.
///
/// `x` is the width of each section
/// `y` is the height of each section
/// `z` is the number of sections (1 for a 2D image)
/// `n` is the number of items in a stack (1 for a single image or volume)
///
/// The all-zero value is the "null" dimension.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Default)]
pub struct ArrayDim {
    pub x : usize,
    pub y : usize,
    pub z : usize,
    pub n : usize,
}

impl ArrayDim {
    pub const NULL : ArrayDim = ArrayDim { x : 0, y : 0, z : 0, n : 0 };

    pub fn new(x : usize, y : usize, z : usize, n : usize) -> ArrayDim {
        ArrayDim { x, y, z, n }
    }

    /// A single 2D image, `z = n = 1`
    pub fn from_xy(x : usize, y : usize) -> ArrayDim {
        ArrayDim { x, y, z : 1, n : 1 }
    }

    pub fn is_null(&self) -> bool {
        *self == ArrayDim::NULL
    }

    /// Number of elements in one item of the stack (`x * y * z`)
    pub fn item_size(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Number of elements in the whole array (`x * y * z * n`)
    pub fn size(&self) -> usize {
        self.item_size() * self.n
    }

    /// The same extent with the stack count replaced by `n`
    pub fn with_n(&self, n : usize) -> ArrayDim {
        ArrayDim { n, ..*self }
    }

    /// True if both describe items of the same `x, y, z` extent,
    /// regardless of how many items are stacked.
    pub fn same_item(&self, other : &ArrayDim) -> bool {
        self.with_n(1) == other.with_n(1)
    }

    /// Returns the dimensions as a tuple `(n, z, y, x)`, slowest
    /// axis first, matching the memory layout of the pixel buffer.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.n, self.z, self.y, self.x)
    }
}

impl std::fmt::Display for ArrayDim {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.n)
    }
}
