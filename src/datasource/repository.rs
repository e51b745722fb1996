pub mod episode;
pub mod settings;
pub mod watermark;
