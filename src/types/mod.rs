pub use self::{
    map_data::{MapData, MapLink, MapNode, MapTokenLink},
    map_metadata::{IdentifiedSupply, MapMetadata, MetadataStatus},
    snapshot::{build_snapshot, SnapshotLimits},
};

mod map_data;
mod map_metadata;
mod snapshot;
