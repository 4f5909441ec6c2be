use std::io::ErrorKind;

use thiserror::Error;

use crate::model::{Length, LocationType, Point};

/// Failure to turn a `Path` into a valid `LineLocation`.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum LocationError {
    #[error("location path is empty")]
    Empty,
    #[error("location path is not a connected sequence of edges")]
    NotConnected,
    #[error("location offsets are invalid: pos={0:?} neg={1:?}")]
    InvalidOffsets((Length, Length)),
}

/// Failure to decode an OpenLR location reference against a target map.
#[derive(Error, Debug, PartialEq, Clone, Copy)]
pub enum DecodeError {
    #[error("OpenLR invalid Base 64")]
    InvalidBase64,
    #[error("OpenLR buffer I/O error: {0:?}")]
    IO(ErrorKind),
    #[error("OpenLR version {0} not supported")]
    VersionNotSupported(u8),
    #[error("OpenLR header is not valid: {0:08b}")]
    InvalidHeader(u8),
    #[error("OpenLR FRC is not valid: {0}")]
    InvalidFrc(u8),
    #[error("OpenLR FOW is not valid: {0}")]
    InvalidFow(u8),
    #[error("OpenLR Orientation is not valid: {0}")]
    InvalidOrientation(u8),
    #[error("OpenLR Side of Road is not valid: {0}")]
    InvalidSideOfRoad(u8),
    #[error("location type {0:?} is not supported by this decoder")]
    LocationTypeNotSupported(LocationType),
    #[error("no candidate line found for location reference point {0:?}")]
    CandidatesNotFound(Point),
    #[error("no route could be resolved between two consecutive location reference points")]
    RouteNotFound,
    #[error(transparent)]
    InvalidLocation(#[from] LocationError),
}

impl From<base64::DecodeError> for DecodeError {
    fn from(_: base64::DecodeError) -> Self {
        Self::InvalidBase64
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(error: std::io::Error) -> Self {
        Self::IO(error.kind())
    }
}

/// Failure originating in a geometric helper (buffering, splitting, hull construction, ...)
/// rather than in the decoder itself.
#[derive(Error, Debug, Clone)]
pub enum GeometryError {
    #[error("geometry is empty where a non-empty geometry was required")]
    EmptyGeometry,
    #[error("failed to parse WKB geometry: {0}")]
    InvalidWkb(String),
    #[error("geometry operation produced no result: {0}")]
    OperationFailed(&'static str),
}

/// Failure constructing or querying a `RoadMap` from its backing GeoJSON document.
#[derive(Error, Debug)]
pub enum RoadMapError {
    #[error("failed to read road map source: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse road map GeoJSON: {0}")]
    Parse(String),
    #[error("road map feature is missing required property {0:?}")]
    MissingProperty(&'static str),
    #[error("road map contains no usable edges")]
    Empty,
}
