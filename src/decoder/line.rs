//! 1. Decode physical data and check its validity.
//! 2. For each location reference point find candidate nodes.
//! 3. For each location reference point find candidate lines.
//! 4. Rate candidate lines for each location reference point.
//! 5. Determine shortest-path(s) between two subsequent location reference points.
//! 6. Check validity of the calculated shortest-path(s).
//! 7. Concatenate shortest-path(s) to form the location and trim path according to the offsets.

use tracing::debug;

use crate::decoder::candidates::{CandidateLine, find_candidate_lines, find_candidate_nodes};
use crate::decoder::resolver::resolve_routes;
use crate::decoder::route::Routes;
use crate::{DecodeError, DecoderConfig, DirectedGraph, Line, LineLocation, Point};

pub fn decode_line<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    line: Line,
) -> Result<LineLocation<G::EdgeId>, DecodeError> {
    let (location, _) = decode_line_routes(config, graph, line)?;
    Ok(location)
}

/// Decodes the location reference and additionally returns the confirmed candidate line chosen
/// for each location reference point, for callers that need to compare the decoder's placements
/// rather than just the trimmed path (e.g. the candidate comparator).
pub fn decode_line_with_candidates<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    line: Line,
) -> Result<(LineLocation<G::EdgeId>, Vec<CandidateLine<G::EdgeId>>), DecodeError> {
    let (location, routes) = decode_line_routes(config, graph, line)?;
    Ok((location, routes.candidate_path()))
}

fn decode_line_routes<G: DirectedGraph>(
    config: &DecoderConfig,
    graph: &G,
    line: Line,
) -> Result<(LineLocation<G::EdgeId>, Routes<G::EdgeId>), DecodeError> {
    debug!("Decoding {line:?} with {config:?}");

    // Step – 2 For each location reference point find candidate nodes
    let lrps_count = line.points.len();
    let nodes = find_candidate_nodes(config, graph, &line.points);

    // Step – 3 For each location reference point find candidate lines
    // Step – 4 Rate candidate lines for each location reference point
    let lines = find_candidate_lines(config, graph, nodes)?;
    debug_assert_eq!(lines.len(), lrps_count);

    // Step – 5 Determine shortest-path(s) between all subsequent location reference points
    // Step – 6 Check validity of the calculated shortest-path(s)
    let routes = resolve_routes(config, graph, &lines)?;
    debug_assert!(!routes.is_empty() && routes.len() < lrps_count);

    // Step – 7 Concatenate and trim path according to the offsets
    let (pos_offset, neg_offset) = routes
        .calculate_offsets(graph, line.offsets)
        .ok_or(DecodeError::RouteNotFound)?;

    let location = LineLocation {
        path: routes.to_path(),
        pos_offset,
        neg_offset,
    }
    .trim(graph)?;

    debug_assert!(!location.path.is_empty());
    debug_assert!(location.path.windows(2).all(|w| w[0] != w[1]));

    Ok((location, routes))
}
