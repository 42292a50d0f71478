pub mod document;
pub mod guard;
pub mod package;
pub mod reader;
pub mod rels;
pub mod tree;
pub mod xml;
