//! Point storage in dimension-major layout.

use crate::error::Error;

/// An immutable collection of `N` points in `R^D`.
///
/// Storage is dimension-major: a dense point set is a `D x N` matrix whose
/// columns are contiguous, so a single point is one cache-friendly slice.
/// A delay embedding stores only the scalar series and reads its points
/// through strided views, never materializing the embedded matrix.
#[derive(Debug, Clone)]
pub enum PointSet {
    /// A `D x N` matrix owned directly, one contiguous column per point.
    Dense {
        /// Column-contiguous coordinates, `data[i * dim + j]` is coordinate
        /// `j` of point `i`.
        data: Vec<f64>,
        /// Dimension of each point.
        dim: usize,
    },
    /// The delay embedding of a scalar time series: point `i` is
    /// `(s[i], s[i + delay], ..., s[i + (dim - 1) * delay])`.
    DelayEmbedding {
        /// The scalar series.
        series: Vec<f64>,
        /// Embedding dimension (`m`).
        dim: usize,
        /// Embedding delay in samples (`tau`).
        delay: usize,
    },
}

impl PointSet {
    /// Wraps a dimension-major `D x N` matrix.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPointSet`] if `data` is empty.
    /// - [`Error::InvalidParameter`] if `dim` is zero or does not divide
    ///   `data.len()`.
    pub fn dense(data: Vec<f64>, dim: usize) -> Result<Self, Error> {
        if dim == 0 {
            return Err(Error::invalid("dim", "must be at least 1"));
        }
        if data.is_empty() {
            return Err(Error::EmptyPointSet);
        }
        if data.len() % dim != 0 {
            return Err(Error::invalid(
                "data",
                format!("length {} is not a multiple of dimension {dim}", data.len()),
            ));
        }
        Ok(Self::Dense { data, dim })
    }

    /// Wraps a scalar series as a delay embedding with dimension `dim` and
    /// delay `delay`, exposing `series.len() - (dim - 1) * delay` points.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPointSet`] if `series` is empty.
    /// - [`Error::InvalidParameter`] if `dim` or `delay` is zero, or if the
    ///   series is too short to hold even one embedded point.
    pub fn delay_embedding(series: Vec<f64>, dim: usize, delay: usize) -> Result<Self, Error> {
        if dim == 0 {
            return Err(Error::invalid("dim", "must be at least 1"));
        }
        if delay == 0 {
            return Err(Error::invalid("delay", "must be at least 1"));
        }
        if series.is_empty() {
            return Err(Error::EmptyPointSet);
        }
        let needed = (dim - 1) * delay + 1;
        if series.len() < needed {
            return Err(Error::invalid(
                "series",
                format!(
                    "length {} is too short for dimension {dim} and delay {delay} (needs at least {needed})",
                    series.len()
                ),
            ));
        }
        Ok(Self::DelayEmbedding { series, dim, delay })
    }

    /// The number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dense { data, dim } => data.len() / *dim,
            Self::DelayEmbedding { series, dim, delay } => series.len() - (*dim - 1) * *delay,
        }
    }

    /// Whether the set holds no points. Construction rejects empty input, so
    /// this is `false` for any value built through the public constructors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dimension of each point.
    #[must_use]
    pub const fn dim(&self) -> usize {
        match self {
            Self::Dense { dim, .. } | Self::DelayEmbedding { dim, .. } => *dim,
        }
    }

    /// A borrowed view of point `i`.
    ///
    /// # Panics
    ///
    /// If `i` is out of bounds.
    #[must_use]
    pub fn point(&self, i: usize) -> PointView<'_> {
        match self {
            Self::Dense { data, dim } => PointView::Contiguous(&data[i * *dim..(i + 1) * *dim]),
            Self::DelayEmbedding { series, dim, delay } => PointView::Strided {
                series,
                start: i,
                stride: *delay,
                len: *dim,
            },
        }
    }

    /// Copies point `i` into `out`, materializing an embedded point so that
    /// it can be used as a query vector.
    ///
    /// # Panics
    ///
    /// If `i` is out of bounds or `out.len() != self.dim()`.
    pub fn copy_point_into(&self, i: usize, out: &mut [f64]) {
        assert_eq!(out.len(), self.dim(), "output slice must have length D");
        for (slot, x) in out.iter_mut().zip(self.point(i).coords()) {
            *slot = x;
        }
    }
}

/// A borrowed view of a single point.
#[derive(Debug, Clone, Copy)]
pub enum PointView<'a> {
    /// A contiguous column of a dense matrix.
    Contiguous(&'a [f64]),
    /// A strided window into a scalar series.
    Strided {
        /// The backing series.
        series: &'a [f64],
        /// Index of the first coordinate.
        start: usize,
        /// Step between consecutive coordinates.
        stride: usize,
        /// Number of coordinates.
        len: usize,
    },
}

impl<'a> PointView<'a> {
    /// The number of coordinates.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Contiguous(slice) => slice.len(),
            Self::Strided { len, .. } => *len,
        }
    }

    /// Whether the view holds no coordinates.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the coordinates into a fresh vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.coords().collect()
    }

    /// Iterates the coordinates in order.
    pub(crate) const fn coords(&self) -> PointCoords<'a> {
        match *self {
            Self::Contiguous(slice) => PointCoords::Contiguous { slice, pos: 0 },
            Self::Strided {
                series,
                start,
                stride,
                len,
            } => PointCoords::Strided {
                series,
                pos: start,
                stride,
                remaining: len,
            },
        }
    }
}

/// Iterator over the coordinates of a [`PointView`].
#[derive(Debug)]
pub(crate) enum PointCoords<'a> {
    /// Walking a contiguous slice.
    Contiguous {
        /// The coordinates.
        slice: &'a [f64],
        /// Next position.
        pos: usize,
    },
    /// Walking a series with a fixed stride.
    Strided {
        /// The backing series.
        series: &'a [f64],
        /// Next position.
        pos: usize,
        /// Step between coordinates.
        stride: usize,
        /// Coordinates left to yield.
        remaining: usize,
    },
}

impl Iterator for PointCoords<'_> {
    type Item = f64;

    #[inline]
    fn next(&mut self) -> Option<f64> {
        match self {
            PointCoords::Contiguous { slice, pos } => {
                let x = slice.get(*pos).copied();
                *pos += 1;
                x
            }
            PointCoords::Strided {
                series,
                pos,
                stride,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let x = series[*pos];
                *pos += *stride;
                *remaining -= 1;
                Some(x)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            PointCoords::Contiguous { slice, pos } => slice.len().saturating_sub(*pos),
            PointCoords::Strided { remaining, .. } => *remaining,
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for PointCoords<'_> {}

/// A borrowed dimension-major `D x M` matrix of query vectors.
#[derive(Debug, Clone, Copy)]
pub struct QueryMatrix<'a> {
    /// Column-contiguous coordinates.
    data: &'a [f64],
    /// Length of each query vector.
    dim: usize,
}

impl<'a> QueryMatrix<'a> {
    /// Wraps a dimension-major slice of `M` query vectors of length `dim`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `dim` is zero or does not divide
    /// `data.len()`.
    pub fn new(data: &'a [f64], dim: usize) -> Result<Self, Error> {
        if dim == 0 {
            return Err(Error::invalid("dim", "must be at least 1"));
        }
        if data.len() % dim != 0 {
            return Err(Error::invalid(
                "data",
                format!("length {} is not a multiple of dimension {dim}", data.len()),
            ));
        }
        Ok(Self { data, dim })
    }

    /// The number of query vectors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Whether the matrix holds no queries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `j`-th query vector as a contiguous slice.
    ///
    /// # Panics
    ///
    /// If `j` is out of bounds.
    #[must_use]
    pub fn column(&self, j: usize) -> &'a [f64] {
        &self.data[j * self.dim..(j + 1) * self.dim]
    }

    /// Iterates the query vectors in order.
    pub fn columns(&self) -> impl Iterator<Item = &'a [f64]> + '_ {
        (0..self.len()).map(move |j| self.column(j))
    }
}
