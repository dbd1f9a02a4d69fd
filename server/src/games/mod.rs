//! Concrete games the server can host.

pub mod rock_paper_scissors;

pub use rock_paper_scissors::RockPaperScissors;
