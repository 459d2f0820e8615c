mod bounds;

pub use bounds::MapBounds;
