/// Row-major 2D container with clamped and bordered access.
///
/// `get`/`set` expect in-range coordinates and panic otherwise. The signed
/// accessors (`get_clamp`, `get_border`, `set_safe`) accept any coordinate,
/// including negative ones, and never index outside the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
    border: T,
}

impl<T: Copy + Default> Grid<T> {
    /// Allocate a `width` x `height` grid filled with `T::default()`.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
            border: T::default(),
        }
    }

    /// Discard the current contents and reallocate with new dimensions.
    /// The sentinel border value resets to `T::default()`.
    pub fn init(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value returned by `get_border` for out-of-range coordinates.
    pub fn border(&self) -> T {
        self.border
    }

    pub fn set_border(&mut self, value: T) {
        self.border = value;
    }

    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "grid access ({x}, {y}) outside {}x{}",
            self.width,
            self.height
        );
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> T {
        self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let i = self.index(x, y);
        &mut self.data[i]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    /// Read with both coordinates clamped into `[0, dim - 1]`.
    pub fn get_clamp(&self, x: i32, y: i32) -> T {
        let cx = clamp_coord(x, self.width);
        let cy = clamp_coord(y, self.height);
        self.get(cx, cy)
    }

    /// Read, returning the sentinel border value for any out-of-range coordinate.
    pub fn get_border(&self, x: i32, y: i32) -> T {
        match self.in_range(x, y) {
            Some((ux, uy)) => self.get(ux, uy),
            None => self.border,
        }
    }

    /// Write if the coordinate is in range; silently ignore it otherwise.
    pub fn set_safe(&mut self, x: i32, y: i32, value: T) {
        if let Some((ux, uy)) = self.in_range(x, y) {
            self.set(ux, uy, value);
        }
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn row(&self, y: usize) -> &[T] {
        let start = self.index(0, y);
        &self.data[start..start + self.width]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn in_range(&self, x: i32, y: i32) -> Option<(usize, usize)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (ux, uy) = (x as usize, y as usize);
        (ux < self.width && uy < self.height).then_some((ux, uy))
    }
}

fn clamp_coord(v: i32, dim: usize) -> usize {
    assert!(dim > 0, "cannot clamp into an empty grid axis");
    let max = (dim - 1).min(i32::MAX as usize) as i32;
    v.clamp(0, max) as usize
}
