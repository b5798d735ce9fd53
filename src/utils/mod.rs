pub mod issn;
