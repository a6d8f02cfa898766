pub mod nextjs;
pub mod pack;
