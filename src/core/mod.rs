pub mod entities;
pub mod reference;
