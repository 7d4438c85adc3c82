pub mod world;

pub use world::TestWorld;
