//! Pane layout.
//!
//! A [`Layout`] maps a pane count onto pixel rectangles inside the root
//! surface.  Two descriptors exist:
//!
//! * [`Layout::Grid`] — a near-square grid derived from the pane count,
//!   growing columns before rows.
//! * [`Layout::Manual`] — user supplied [`NormalizedRect`]s whose edges are
//!   ratios of the root size.
//!
//! Layouts are pure: [`Layout::apply`] has no hidden state and can be called
//! repeatedly with different root sizes.

use std::num::ParseFloatError;

/// A pixel rectangle relative to the root surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in square pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether two rectangles share any pixel.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Error from parsing a layout ratio such as `"1/2"` or `"0.75"`.
#[derive(Debug, thiserror::Error)]
pub enum RatioError {
    /// Neither a decimal literal nor a `numerator/denominator` fraction.
    #[error("{input:?}: invalid ratio")]
    Format { input: String },
    /// One side of a fraction is not a number.
    #[error("{input:?}: {source}")]
    Number {
        input: String,
        #[source]
        source: ParseFloatError,
    },
    /// The fraction's denominator is zero.
    #[error("{input:?}: division by zero")]
    DivisionByZero { input: String },
    /// The ratio lies outside `[0, 1]`.
    #[error("{input:?}: ratio must be within 0 and 1")]
    OutOfRange { input: String },
}

/// Parse a ratio written as a decimal literal (`"0.75"`) or as a fraction
/// (`"3/4"`).
pub fn parse_ratio(input: &str) -> Result<f64, RatioError> {
    let trimmed = input.trim();
    let value = match trimmed.parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            let (num, den) = trimmed.split_once('/').ok_or_else(|| RatioError::Format {
                input: input.to_string(),
            })?;
            let number = |s: &str| {
                s.trim().parse::<f64>().map_err(|source| RatioError::Number {
                    input: input.to_string(),
                    source,
                })
            };
            let (num, den) = (number(num)?, number(den)?);
            if den == 0.0 {
                return Err(RatioError::DivisionByZero {
                    input: input.to_string(),
                });
            }
            num / den
        }
    };
    if !value.is_finite() {
        return Err(RatioError::Format {
            input: input.to_string(),
        });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(RatioError::OutOfRange {
            input: input.to_string(),
        });
    }
    Ok(value)
}

/// A rectangle whose edges are fractions of the root size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedRect {
    /// Parse the four ratio strings of a manual layout entry.
    pub fn parse(x: &str, y: &str, w: &str, h: &str) -> Result<Self, RatioError> {
        Ok(Self {
            x: parse_ratio(x)?,
            y: parse_ratio(y)?,
            w: parse_ratio(w)?,
            h: parse_ratio(h)?,
        })
    }

    /// Convert to pixels.
    ///
    /// Width and height come from the rounded far edge minus the rounded
    /// near edge so that tiles sharing an edge never leave a 1px gap.
    pub fn to_pixels(&self, width: u32, height: u32) -> Rect {
        let (fw, fh) = (width as f64, height as f64);
        let x = (self.x * fw).round() as u32;
        let y = (self.y * fh).round() as u32;
        let right = (((self.x + self.w) * fw).round() as u32).min(width);
        let bottom = (((self.y + self.h) * fh).round() as u32).min(height);
        Rect {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }
}

/// Layout descriptor.  Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Automatic grid for the given number of panes.
    Grid(usize),
    /// One rectangle per pane.
    Manual(Vec<NormalizedRect>),
}

impl Layout {
    /// Number of rectangles [`apply`](Self::apply) produces.
    pub fn count(&self) -> usize {
        match self {
            Layout::Grid(count) => *count,
            Layout::Manual(rects) => rects.len(),
        }
    }

    /// Compute pane rectangles for a root of `width × height` pixels.
    pub fn apply(&self, width: u32, height: u32) -> Vec<Rect> {
        match self {
            Layout::Grid(count) => grid_rects(*count, width, height),
            Layout::Manual(rects) => rects.iter().map(|r| r.to_pixels(width, height)).collect(),
        }
    }
}

/// Derive `(columns, rows)` for `count` panes.
///
/// Columns and rows grow alternately, columns first, until the grid holds
/// `count` cells, so 4 panes give 2×2 and 5 panes give 3×2.
pub fn grid_dimensions(count: usize) -> (usize, usize) {
    let (mut columns, mut rows) = (0, 0);
    if count == 0 {
        return (columns, rows);
    }
    loop {
        columns += 1;
        if columns * rows >= count {
            break;
        }
        rows += 1;
        if columns * rows >= count {
            break;
        }
    }
    (columns, rows)
}

fn grid_rects(count: usize, width: u32, height: u32) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let (columns, rows) = grid_dimensions(count);
    let pane_width = width / columns as u32;
    let pane_height = height / rows as u32;
    (0..count)
        .map(|i| {
            let row = (i / columns) as u32;
            let col = (i % columns) as u32;
            Rect::new(col * pane_width, row * pane_height, pane_width, pane_height)
        })
        .collect()
}

//  Tests
