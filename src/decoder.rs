//! The decoder resolves a (map-dependent) location using its own map.
//! This map might differ from the one used during encoding.
//!
//! 1. Decode physical data and check its validity.
//! 2. For each location reference point find candidate nodes.
//! 3. For each location reference point find candidate lines.
//! 4. Rate candidate lines for each location reference point.
//! 5. Determine shortest-path(s) between two subsequent location reference points.
//! 6. Check validity of the calculated shortest-path(s).
//! 7. Concatenate shortest-path(s) to form the location and trim path according to the offsets.

mod candidates;
mod line;
mod resolver;
mod route;
mod shortest_path;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::decoder::candidates::CandidateLine;
use crate::decoder::line::{decode_line, decode_line_with_candidates};
use crate::error::DecodeError;
use crate::model::RatingScore;
use crate::{Bearing, DirectedGraph, Length, Location, LocationReference, deserialize_binary_openlr};

#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    /// Maximum distance from the LRP to the nodes of the graph that will be considered.
    pub max_node_distance: Length,
    /// The length of the segment used to compute the lines bearing (distance from the start of
    /// the segment to its end).
    pub bearing_distance: Length,
    /// Maximum bearing difference between the candidate line bearing and the LRP bearing for the
    /// candidate to be accepted.
    pub max_bearing_difference: Bearing,
    /// Node weight applied by the rating function.
    pub node_factor: f64,
    /// Line weight applied by the rating function.
    pub line_factor: f64,
    /// Projected line weight applied by the rating function.
    pub projected_line_factor: f64,
    /// Minimum rating score for a line to be accepted as candidate.
    pub min_line_rating: RatingScore,
    /// Maximum number of resolver retries.
    pub max_number_retries: usize,
    /// Variance allowed to the resolver when computing distance between LRPs.
    pub next_point_variance: Length,
    /// Factor applied to reduce the rating of the top K best candidate LRP lines on the same line.
    pub same_line_degradation: f64,
    /// Disables the FRC/LFRCNP variance rejection gate, both at the candidate-rating layer and
    /// for the shortest-path FRC ceiling.
    pub ignore_frc: bool,
    /// Saturates the FOW contribution to the rating formula to its maximum instead of letting a
    /// mismatch contribute a deficit.
    pub ignore_fow: bool,
    /// Disables the bearing-difference rejection gate.
    pub ignore_bearing: bool,
    /// Widens the resolver's length-variance check and the shortest-path search bound to
    /// effectively unbounded.
    pub ignore_path_length: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_node_distance: Length::from_meters(100.0),
            bearing_distance: Length::from_meters(20.0),
            max_bearing_difference: Bearing::from_degrees(90),
            node_factor: 3.0,
            line_factor: 3.0,
            projected_line_factor: 0.95,
            min_line_rating: RatingScore::from(700.0),
            max_number_retries: 8,
            next_point_variance: Length::from_meters(150.0),
            same_line_degradation: 0.85,
            ignore_frc: false,
            ignore_fow: false,
            ignore_bearing: false,
            ignore_path_length: false,
        }
    }
}

impl DecoderConfig {
    /// The baseline configuration: tight geo/bearing/FRC tolerances, strict path length.
    pub fn strict() -> Self {
        Self::default()
    }

    /// A less strict baseline: wider tolerances, still enforces every axis.
    pub fn relaxed() -> Self {
        Self {
            max_node_distance: Length::from_meters(150.0),
            max_bearing_difference: Bearing::from_degrees(130),
            next_point_variance: Length::from_meters(300.0),
            min_line_rating: RatingScore::from(500.0),
            ..Self::default()
        }
    }

    /// Tests for *any* connected route obeying geometry and one-way direction: FRC/FOW/bearing
    /// gating and path-length bounds are all disabled.
    pub fn any_path() -> Self {
        Self {
            max_bearing_difference: Bearing::from_degrees(180),
            min_line_rating: RatingScore::ZERO,
            max_number_retries: 32,
            ignore_frc: true,
            ignore_fow: true,
            ignore_bearing: true,
            ignore_path_length: true,
            ..Self::default()
        }
    }

    /// Tests FRC as the cause of a discrepancy: only the FRC-variance rejection gate is disabled.
    pub fn ignore_frc() -> Self {
        Self {
            ignore_frc: true,
            ..Self::default()
        }
    }

    /// Tests FOW as the cause of a discrepancy: the FOW rating contribution is saturated instead
    /// of contributing a deficit.
    pub fn ignore_fow() -> Self {
        Self {
            ignore_fow: true,
            ..Self::default()
        }
    }

    /// Tests bearing as the cause of a discrepancy: only the bearing-difference gate is disabled.
    pub fn ignore_bearing() -> Self {
        Self {
            ignore_bearing: true,
            ..Self::default()
        }
    }

    /// Tests path length as the cause of a discrepancy: the length-variance bounds are widened
    /// to effectively unbounded.
    pub fn ignore_path_length() -> Self {
        Self {
            ignore_path_length: true,
            ..Self::default()
        }
    }
}

/// Decodes an OpenLR Location Reference encoded in Base64.
pub fn decode_base64_openlr<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    data: impl AsRef<[u8]>,
) -> Result<Location<G::EdgeId>, DecodeError> {
    let data = BASE64_STANDARD.decode(data).map_err(DecodeError::from)?;
    decode_binary_openlr(config, graph, &data)
}

/// Decodes an OpenLR Location Reference encoded in binary.
pub fn decode_binary_openlr<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    data: &[u8],
) -> Result<Location<G::EdgeId>, DecodeError> {
    // Step â€“ 1 Decode physical data and check its validity
    let location = deserialize_binary_openlr(data)?;

    match location {
        LocationReference::Line(line) => decode_line(config, graph, line).map(Location::Line),
        _ => Err(DecodeError::LocationTypeNotSupported(
            location.location_type(),
        )),
    }
}

/// Decodes an OpenLR Location Reference encoded in Base64, additionally returning the
/// confirmed candidate line chosen for each location reference point.
pub fn decode_base64_openlr_with_candidates<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    data: impl AsRef<[u8]>,
) -> Result<(Location<G::EdgeId>, Vec<CandidateLine<G::EdgeId>>), DecodeError> {
    let data = BASE64_STANDARD.decode(data).map_err(DecodeError::from)?;
    decode_binary_openlr_with_candidates(config, graph, &data)
}

/// Decodes an OpenLR Location Reference encoded in binary, additionally returning the
/// confirmed candidate line chosen for each location reference point.
pub fn decode_binary_openlr_with_candidates<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    data: &[u8],
) -> Result<(Location<G::EdgeId>, Vec<CandidateLine<G::EdgeId>>), DecodeError> {
    let location = deserialize_binary_openlr(data)?;

    match location {
        LocationReference::Line(line) => {
            let (location, candidates) = decode_line_with_candidates(config, graph, line)?;
            Ok((Location::Line(location), candidates))
        }
        _ => Err(DecodeError::LocationTypeNotSupported(
            location.location_type(),
        )),
    }
}
