pub mod map;
pub mod page;
pub mod xml;
