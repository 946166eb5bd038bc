//! Coupon discount engine.

mod discount;
mod usage;

pub use discount::{
    decode_course_ids, encode_course_ids, normalize_code, Coupon, CouponIneligibility,
    DiscountType,
};
pub use usage::CouponUsage;
