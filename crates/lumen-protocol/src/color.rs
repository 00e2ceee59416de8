//! RGBA colour model
//!
//! The sequencing engine produces one [`Rgba`] per addressable element.
//! Alpha is not a blending factor here: `a == 0` means the element is off.

/// Per-strand (or per-universe) sequence of colours in element order.
pub type ChannelBuffer = Vec<Rgba>;

/// 8-bit RGBA colour.
///
/// # Example
///
/// ```
/// use lumen_protocol::Rgba;
///
/// let lit = Rgba::new(255, 10, 200, 255);
/// assert_eq!(lit.to_wire(), [255, 10, 200]);
///
/// // alpha 0 forces black, whatever the colour channels say
/// let off = Rgba::new(255, 10, 200, 0);
/// assert_eq!(off.to_wire(), [0, 0, 0]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black; rendered as off.
    pub const OFF: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, u8::MAX)
    }

    pub const fn is_off(&self) -> bool {
        self.a == 0
    }

    /// Wire triple for this element.
    ///
    /// No gamma or alpha blending is applied; that belongs to the sequencing
    /// engine if it is wanted at all.
    pub const fn to_wire(&self) -> [u8; 3] {
        if self.is_off() {
            [0, 0, 0]
        } else {
            [self.r, self.g, self.b]
        }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<(u8, u8, u8)> for Rgba {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::opaque(r, g, b)
    }
}
