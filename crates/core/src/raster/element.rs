//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Remote bands arrive as integer reflectance and are widened to `f64` for
/// clustering; labels are written back as `u8`.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, falling back to the type's no-data value
    fn from_f64_or_nodata(v: f64) -> Self {
        NumCast::from(v).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_raster_element {
    (int: $($t:ty),*) => {
        $(impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_float() -> bool {
                false
            }
        })*
    };
    (float: $($t:ty),*) => {
        $(impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_float() -> bool {
                true
            }
        })*
    };
}

impl_raster_element!(int: i8, i16, i32, i64, u8, u16, u32, u64);
impl_raster_element!(float: f32, f64);
