pub mod asset_container;
pub mod mesh_buffers;
pub mod object_record;
