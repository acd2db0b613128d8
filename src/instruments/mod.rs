//! Instrument definitions.

pub mod autocallable;

pub use autocallable::{
    AutocallableNote, CapitalBarrier, RedemptionEvent, RedemptionSchedule, UpfrontCoupon,
};
