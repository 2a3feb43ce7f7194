pub mod crawler;
pub mod fetch;
pub mod render;
pub mod web;

pub use crawler::{PageFetcher, PageRenderer};
pub use fetch::HttpFetcher;
pub use render::WebDriverRenderer;
pub use web::SiteWalker;
