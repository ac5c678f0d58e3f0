pub mod media;
pub mod title;
