#![doc = include_str!("../README.md")]

mod analyzer;
mod binary;
mod decoder;
mod error;
mod geo;
mod graph;
mod location;
mod model;
mod overlay;
mod roadmap;
mod wkb;
mod worker;

pub use analyzer::{AnalysisResult, AnalyzerConfig, analyze};
pub use binary::{deserialize_base64_openlr, deserialize_binary_openlr};
pub use decoder::candidates::{
    CandidateLine, CandidateLinePair, CandidateLines, CandidateNode, CandidateNodes, CandidateScore,
    find_candidate_lines, find_candidate_nodes, score_candidate_line,
};
pub use decoder::line::{decode_line, decode_line_with_candidates};
pub use decoder::resolver::resolve_routes;
pub use decoder::route::{Route, Routes};
pub use decoder::shortest_path::shortest_path;
pub use decoder::{
    DecoderConfig, decode_base64_openlr, decode_base64_openlr_with_candidates,
    decode_binary_openlr, decode_binary_openlr_with_candidates,
};
pub use error::{DecodeError, GeometryError, LocationError, RoadMapError};
pub use graph::DirectedGraph;
pub use graph::path::{Path, is_opposite_direction, is_path_connected};
pub use location::{LineLocation, Location, ensure_line_is_valid};
pub use model::{
    Bearing, Circle, ClosedLine, Coordinate, Fow, Frc, Grid, GridSize, Length, Line,
    LineAttributes, LocationReference, LocationType, Offset, Offsets, Orientation, PathAttributes,
    Poi, Point, PointAlongLine, Polygon, RatingScore, Rectangle, SideOfRoad,
};
pub use overlay::BufferOverlay;
pub use roadmap::RoadMap;
pub use worker::{WorkItem, WorkResult, run_workers};
