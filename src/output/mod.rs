pub mod atom;

pub use atom::to_atom;
