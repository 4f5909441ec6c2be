mod geojson;
mod network;

pub use geojson::{GEOJSON_GRAPH, GeojsonGraph};
pub use network::{EdgeId, NETWORK_GRAPH, NetworkGraph, VertexId};
