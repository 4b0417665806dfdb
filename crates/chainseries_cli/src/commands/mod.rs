pub mod collect;
pub mod creation_heights;
pub mod groups;
pub mod publish;
