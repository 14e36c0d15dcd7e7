pub mod raw;
pub mod tiff;
pub mod tiff_json;
pub mod trash;
