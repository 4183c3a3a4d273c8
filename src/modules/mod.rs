pub mod img2pdf;
pub mod merge;
pub mod staging;
mod tool;
