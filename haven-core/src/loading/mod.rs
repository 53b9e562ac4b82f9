//! Loading the road network from its durable mirror and writing accepted
//! mutations back to it.

mod builder;
mod json_file;
mod mirror;
mod sample;

pub use builder::{create_route_service, load_network};
pub use json_file::JsonFileMirror;
pub use mirror::{
    DurableMirror, InMemoryMirror, MirrorContents, MirrorHandle, MirrorWrite, spawn_mirror_writer,
};
pub use sample::{sample_network, seed_if_empty};
