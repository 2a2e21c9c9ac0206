// Data model shared by the listing, transfer and scheduling layers

pub mod sync;

pub use sync::*;
