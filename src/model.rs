use std::iter::Sum;
use std::ops::{Add, Mul, MulAssign, Sub};

use approx::abs_diff_eq;
use ordered_float::OrderedFloat;

/// Functional Road Class.
/// The functional road class (FRC) of a line is a road classification
/// based on the importance of the road represented by the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Frc {
    /// Main road, highest importance
    Frc0 = 0,
    /// First class road.
    Frc1 = 1,
    /// Second class road.
    Frc2 = 2,
    /// Third class road.
    Frc3 = 3,
    /// Fourth class road.
    Frc4 = 4,
    /// Fifth class road.
    Frc5 = 5,
    /// Sixth class road.
    Frc6 = 6,
    /// Other class road, lowest importance
    Frc7 = 7,
}

impl Default for Frc {
    fn default() -> Self {
        Self::Frc7
    }
}

impl Frc {
    /// Maximum allowed difference (in FRC steps) between a candidate's FRC and the LFRCNP
    /// of the location reference point before it is rejected outright.
    const VARIANCE: i8 = 0;

    /// A candidate line is only acceptable if its FRC is at least as important as the lowest
    /// FRC to next point (LFRCNP) announced by the location reference point, within variance.
    pub fn is_within_variance(&self, lfrcnp: &Self) -> bool {
        (*self as i8) - (*lfrcnp as i8) <= Self::VARIANCE
    }

    /// Returns a value in `[0.0, 1.0]`, 1.0 meaning an exact match.
    pub fn rating(&self, other: &Self) -> f64 {
        let diff = (*self as i8 - *other as i8).unsigned_abs() as f64;
        (1.0 - diff / 7.0).max(0.0)
    }

    pub fn rating_score(rating: f64) -> RatingScore {
        RatingScore::from(rating * 100.0)
    }

    /// Reads an FRC out of a GeoJSON feature property, which carries it as a plain integer
    /// rather than as an OpenLR-encoded byte.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Frc0),
            1 => Some(Self::Frc1),
            2 => Some(Self::Frc2),
            3 => Some(Self::Frc3),
            4 => Some(Self::Frc4),
            5 => Some(Self::Frc5),
            6 => Some(Self::Frc6),
            7 => Some(Self::Frc7),
            _ => None,
        }
    }
}

/// Form of Way.
/// The form of way (FOW) describes the physical road type of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Fow {
    /// The physical road type is unknown.
    Undefined = 0,
    /// A Motorway is defined as a road permitted for motorized vehicles
    /// only in combination with a prescribed minimum speed. It has two
    /// or more physically separated carriageways and no single level-crossings.
    Motorway = 1,
    /// A multiple carriageway is defined as a road with physically separated
    /// carriageways regardless of the number of lanes. If a road is also a
    /// motorway, it should be coded as such and not as a multiple carriageway.
    MultipleCarriageway = 2,
    /// All roads without separate carriageways are considered as roads with
    /// a single carriageway.
    SingleCarriageway = 3,
    /// A Roundabout is a road which forms a ring on which traffic traveling
    /// in only one direction is allowed.
    Roundabout = 4,
    /// A Traffic Square is an open area (partly) enclosed by roads which is
    /// used for non-traffic purposes and which is not a Roundabout.
    TrafficSquare = 5,
    /// A Slip Road is a road especially designed to enter or leave a line.
    SlipRoad = 6,
    /// The physical road type is known but does not fit into one of the
    /// other categories.
    Other = 7,
}

impl Default for Fow {
    fn default() -> Self {
        Self::Other
    }
}

impl Fow {
    /// FOW is a soft signal: exact match rates highest, but any other combination still
    /// contributes some rating rather than rejecting the candidate outright.
    pub fn rating(&self, other: &Self) -> f64 {
        if self == other { 1.0 } else { 0.5 }
    }

    pub fn rating_score(rating: f64) -> RatingScore {
        RatingScore::from(rating * 100.0)
    }

    /// Reads a FOW out of a GeoJSON feature property, which carries it as a plain integer
    /// rather than as an OpenLR-encoded byte.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Motorway),
            2 => Some(Self::MultipleCarriageway),
            3 => Some(Self::SingleCarriageway),
            4 => Some(Self::Roundabout),
            5 => Some(Self::TrafficSquare),
            6 => Some(Self::SlipRoad),
            7 => Some(Self::Other),
            _ => None,
        }
    }
}

/// The side of road information (SOR) describes the relationship between the
/// point of interest and a referenced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SideOfRoad {
    /// Point is directly on (or above) the road, or determination of right/left
    /// side is not applicable.
    OnRoadOrUnknown = 0,
    /// Point is on right side of the road.
    Right = 1,
    /// Point is on left side of the road.
    Left = 2,
    /// Point is on both sides of the road.
    Both = 3,
}

impl Default for SideOfRoad {
    fn default() -> Self {
        Self::OnRoadOrUnknown
    }
}

/// The orientation information (ORI) describes the relationship between the
/// point of interest and the direction of a referenced line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Orientation {
    /// Point has no sense of orientation, or determination of orientation
    /// is not applicable
    Unknown = 0,
    /// Point has orientation from first LRP towards second LRP.
    Forward = 1,
    /// Point has orientation from second LRP towards first LRP.
    Backward = 2,
    /// Point has orientation in both directions
    Both = 3,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A distance along the road network, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Length(OrderedFloat<f64>);

impl Length {
    pub const ZERO: Self = Self(OrderedFloat(0.0));
    pub const MAX: Self = Self(OrderedFloat(f64::MAX));
    /// Largest distance-to-next-point OpenLR's binary physical format can encode for a
    /// single location reference point.
    pub const MAX_BINARY_LRP_DISTANCE: Self = Self(OrderedFloat(15_000.0));

    pub fn from_meters(meters: f64) -> Self {
        Self(OrderedFloat(meters))
    }

    pub fn meters(&self) -> f64 {
        self.0.0
    }

    pub fn round(&self) -> Self {
        Self::from_meters(self.meters().round())
    }

    pub fn is_zero(&self) -> bool {
        self.meters() == 0.0
    }
}

impl Add for Length {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_meters(self.meters() + rhs.meters())
    }
}

impl Sub for Length {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_meters(self.meters() - rhs.meters())
    }
}

impl Sum for Length {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

/// The bearing describes the angle between the true North and the road, in degrees `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Bearing(OrderedFloat<f64>);

impl Bearing {
    pub const ZERO: Self = Self(OrderedFloat(0.0));

    pub fn from_degrees(degrees: f64) -> Self {
        Self(OrderedFloat(degrees.rem_euclid(360.0)))
    }

    pub fn degrees(&self) -> f64 {
        self.0.0
    }

    /// The opposite direction, used when a bearing must be sampled from the far end of an edge
    /// (e.g. the last location reference point looks back along the incoming edge).
    pub fn reverse(&self) -> Self {
        Self::from_degrees(self.degrees() + 180.0)
    }

    /// Absolute angular distance to `other`, always in `[0, 180]`.
    pub fn difference(&self, other: &Self) -> Self {
        let diff = (self.degrees() - other.degrees()).abs();
        Self::from_degrees(diff.min(360.0 - diff))
    }

    /// Returns a value in `[0.0, 1.0]`, 1.0 meaning an exact match.
    pub fn rating(&self, other: &Self) -> f64 {
        (1.0 - self.difference(other).degrees() / 180.0).max(0.0)
    }

    pub fn rating_score(rating: f64) -> RatingScore {
        RatingScore::from(rating * 100.0)
    }
}

/// A candidate's fitness score against a location reference point. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RatingScore(OrderedFloat<f64>);

impl RatingScore {
    pub const ZERO: Self = Self(OrderedFloat(0.0));
}

impl From<f64> for RatingScore {
    fn from(value: f64) -> Self {
        Self(OrderedFloat(value))
    }
}

impl From<Length> for RatingScore {
    fn from(length: Length) -> Self {
        Self(OrderedFloat(length.meters()))
    }
}

impl Add for RatingScore {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for RatingScore {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for RatingScore {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self(OrderedFloat(self.0.0 * rhs))
    }
}

impl Mul<RatingScore> for f64 {
    type Output = RatingScore;

    fn mul(self, rhs: RatingScore) -> RatingScore {
        rhs * self
    }
}

impl Mul for RatingScore {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(OrderedFloat(self.0.0 * rhs.0.0))
    }
}

impl MulAssign<f64> for RatingScore {
    fn mul_assign(&mut self, rhs: f64) {
        self.0 = OrderedFloat(self.0.0 * rhs);
    }
}

/// Coordinate pair stands for a pair of WGS84 longitude (lon) and latitude (lat) values.
/// This coordinate pair specifies a geometric point in a digital map.
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        const EPSILON: f64 = 1e-5;
        abs_diff_eq!(self.lon, other.lon, epsilon = EPSILON)
            && abs_diff_eq!(self.lat, other.lat, epsilon = EPSILON)
    }
}

/// Line attributes are part of a location reference point and consist of functional road
/// class (FRC), form of way (FOW) and bearing (BEAR) data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineAttributes {
    pub frc: Frc,
    pub fow: Fow,
    pub bearing: Bearing,
}

/// The path attributes are part of a location reference point (except for the last
/// location reference point) and consists of lowest functional road class to next point
/// (LFRCNP) and distance to next point (DNP) data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathAttributes {
    /// Lowest functional road class to next point.
    pub lfrcnp: Frc,
    /// Distance to next point.
    pub dnp: Length,
}

/// The basis of a location reference is a sequence of location reference points (LRPs).
/// A single LRP may be bound to the road network. In such a case all values of the LRP
/// refer to a node or line within the road network. The coordinates refer to a node of
/// a line or a point on a line and the additional attributes refer to attributes of a line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub coordinate: Coordinate,
    pub line: LineAttributes,
    pub path: Option<PathAttributes>,
}

impl Point {
    /// Whether this point has no path attributes, i.e. it is the last LRP of the location.
    pub const fn is_last(&self) -> bool {
        self.path.is_none()
    }
}

/// Offsets are used to locate the start and end of a location more precisely than
/// bounding to the nodes in a network. The logical format defines two offsets,
/// one at the start of the location and one at the end of the location.
/// Both offsets operate along the lines of the location and are measured in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset(f64);

impl Offset {
    pub const fn from_range(range: f64) -> Self {
        Self(range)
    }

    pub const fn range(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offsets {
    pub pos: Offset,
    pub neg: Offset,
}

impl Offsets {
    /// Converts the positive offset (a fraction of the path between the first two location
    /// reference points) into an absolute distance, given the available length of that path.
    pub fn distance_from_start(&self, available_length: Length) -> Length {
        Length::from_meters(self.pos.range() * available_length.meters())
    }

    /// Converts the negative offset (a fraction of the path between the last two location
    /// reference points) into an absolute distance, given the available length of that path.
    pub fn distance_to_end(&self, available_length: Length) -> Length {
        Length::from_meters(self.neg.range() * available_length.meters())
    }
}

/// A line location reference describes a path within a map and consists of location
/// reference point(s), a last location reference point and offset data.
/// There must be at least one location reference point and exactly one last location
/// reference point. The offset field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub points: Vec<Point>,
    pub offsets: Offsets,
}

impl Line {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            offsets: Offsets::default(),
        }
    }
}

/// A closed line location references the area defined by a closed path (i.e. a circuit)
/// in the road network. The boundary always consists of road segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClosedLine {
    pub points: Vec<Point>,
    pub last_line: LineAttributes,
}

/// Point along line is a point location which is defined by a line and an offset value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointAlongLine {
    pub points: [Point; 2],
    pub offset: Offset,
    pub orientation: Orientation,
    pub side: SideOfRoad,
}

/// Point along line with access is a point location which is defined by a line,
/// an offset value and a coordinate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poi {
    pub point: PointAlongLine,
    pub poi: Coordinate,
}

/// A circle location is given by the position of the center and the radius.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Circle {
    pub center: Coordinate,
    pub radius: Length,
}

/// A rectangle location reference consists of the lower left corner point and the
/// upper right corner point, given as a pair of WGS84 coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rectangle {
    pub lower_left: Coordinate,
    pub upper_right: Coordinate,
}

/// A grid location is a special instance of a rectangle location, multiplied to the
/// North (rows) and to the East (columns).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub rect: Rectangle,
    pub size: GridSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GridSize {
    pub columns: u16,
    pub rows: u16,
}

/// A polygon location is a non-intersecting shape defined by a sequence of
/// geo-coordinate pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub corners: Vec<Coordinate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LocationType {
    Line = 0,
    GeoCoordinate = 1,
    PointAlongLine = 2,
    PoiWithAccessPoint = 3,
    Circle = 4,
    Rectangle = 5,
    Grid = 6,
    Polygon = 7,
    ClosedLine = 8,
}

/// Locations are objects in a digital map, like points, paths and areas, as they are held in an
/// OpenLR location reference before decoding against a particular map.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationReference {
    // Line Locations
    Line(Line),
    // Point Locations
    GeoCoordinate(Coordinate),
    PointAlongLine(PointAlongLine),
    Poi(Poi),
    // Area Locations
    Circle(Circle),
    Rectangle(Rectangle),
    Grid(Grid),
    Polygon(Polygon),
    ClosedLine(ClosedLine),
}

impl LocationReference {
    pub const fn location_type(&self) -> LocationType {
        match self {
            Self::Line(_) => LocationType::Line,
            Self::GeoCoordinate(_) => LocationType::GeoCoordinate,
            Self::PointAlongLine(_) => LocationType::PointAlongLine,
            Self::Poi(_) => LocationType::PoiWithAccessPoint,
            Self::Circle(_) => LocationType::Circle,
            Self::Rectangle(_) => LocationType::Rectangle,
            Self::Grid(_) => LocationType::Grid,
            Self::Polygon(_) => LocationType::Polygon,
            Self::ClosedLine(_) => LocationType::ClosedLine,
        }
    }
}
