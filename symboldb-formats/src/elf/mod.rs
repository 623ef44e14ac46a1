//! ELF image parsing: header facts, program headers, the dynamic section,
//! and versioned dynamic symbols.

pub mod image;
pub mod symbols;

pub use image::ElfImage;
pub use symbols::{
    visibility_name, DynamicEntry, ElfSymbol, ElfSymbolDefinition, ElfSymbolReference,
    ProgramHeader,
};
