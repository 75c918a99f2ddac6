pub mod audio;
pub mod clock;
pub mod input;
pub mod ticker;
