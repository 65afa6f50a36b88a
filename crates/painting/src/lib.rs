#![doc = include_str!("../README.md")]

#[doc(inline)]
pub use painting_calib as calib;

#[doc(inline)]
pub use painting_3d as points;

#[doc(inline)]
pub use painting_fusion as fusion;
