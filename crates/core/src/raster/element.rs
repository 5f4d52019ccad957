//! Cell value trait for generic rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Elevations, costs and scores are `f64`; masks, predecessor codes and zone
/// codes are `u8`; nearest-source indices are `u32`.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel used when no explicit no-data value is configured
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }

            fn is_float() -> bool {
                false
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            // NaN is always no-data, whatever sentinel is configured.
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => *self == nd || (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    )*};
}

impl_raster_element_int!(u8, u16, u32, i32, i64);
impl_raster_element_float!(f32, f64);
